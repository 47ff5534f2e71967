use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sendgrid::v3::{Content, Email, Personalization, Sender};
use tracing::info;

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(&self, message: &Message) -> Result<()>;
}

/// Who outgoing mail claims to be from.
#[derive(Clone, Debug)]
pub struct FromAddress {
    pub name: String,
    pub address: String,
}

impl std::fmt::Display for FromAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.address)
    }
}

/// Writes emails to stdout. Used when no SendGrid key is configured.
pub struct ConsoleMailer {
    from: FromAddress,
}

impl ConsoleMailer {
    pub fn new(from: FromAddress) -> Self {
        Self { from }
    }
}

#[async_trait]
impl EmailClient for ConsoleMailer {
    async fn send(&self, message: &Message) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        writeln!(out, "From: {}", self.from)?;
        writeln!(out, "To: {}", message.to)?;
        writeln!(out, "Subject: {}", message.subject)?;
        writeln!(out, "{}", "-".repeat(80))?;
        writeln!(out, "{}\n", message.text)?;

        Ok(())
    }
}

pub struct SendgridMailer {
    from: Email,
    sender: Sender,
}

impl SendgridMailer {
    pub fn new(api_key: String, from: FromAddress) -> Self {
        Self {
            from: Email::new(from.address).set_name(from.name),
            sender: Sender::new(api_key),
        }
    }
}

#[async_trait]
impl EmailClient for SendgridMailer {
    async fn send(&self, message: &Message) -> Result<()> {
        let body = sendgrid::v3::Message::new(self.from.clone())
            .set_subject(&message.subject)
            .add_content(
                Content::new()
                    .set_content_type("text/plain")
                    .set_value(message.text.to_owned()),
            )
            .add_personalization(Personalization::new(Email::new(message.to.to_owned())));

        self.sender
            .send(&body)
            .await
            .with_context(|| format!("SendGrid rejected email to {}", message.to))?;
        info!(subject = %message.subject, "Sent email via SendGrid.");

        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every sent message so tests can inspect them.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Message>>,
        pub fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }

        pub fn messages(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailClient for RecordingMailer {
        async fn send(&self, message: &Message) -> Result<()> {
            if self.fail {
                anyhow::bail!("mail server unavailable");
            }

            self.sent.lock().unwrap().push(message.clone());

            Ok(())
        }
    }
}
