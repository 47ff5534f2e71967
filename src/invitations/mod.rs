pub mod http;
pub mod services;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_LENGTH: usize = 48;

/// How long an invitation can be answered for.
pub fn validity() -> Duration {
    Duration::days(7)
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: Uuid,
    pub account_id: Uuid,
    #[sqlx(default)]
    pub account_name: Option<String>,
    pub inviter_id: Uuid,
    #[sqlx(default)]
    pub inviter_name: Option<String>,
    pub invitee_email: String,
    pub token: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why an invitation can no longer be answered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResponseBlocker {
    Expired,
    AlreadyAnswered(InvitationStatus),
}

impl ResponseBlocker {
    pub fn message(&self) -> String {
        match self {
            Self::Expired => "This invitation has expired.".to_owned(),
            Self::AlreadyAnswered(status) => {
                let status = match status {
                    InvitationStatus::Accepted => "accepted",
                    InvitationStatus::Declined => "declined",
                    InvitationStatus::Pending => "answered",
                };

                format!("This invitation was already {}.", status)
            }
        }
    }
}

impl Invitation {
    pub fn check_can_respond(&self, now: DateTime<Utc>) -> Result<(), ResponseBlocker> {
        if self.status != InvitationStatus::Pending {
            return Err(ResponseBlocker::AlreadyAnswered(self.status));
        }

        if self.expires_at <= now {
            return Err(ResponseBlocker::Expired);
        }

        Ok(())
    }

    /// Invitations are addressed to an email rather than a user, so the
    /// responder is matched on their address.
    pub fn is_addressed_to(&self, email: &str) -> bool {
        self.invitee_email.eq_ignore_ascii_case(email)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewInvitationData {
    pub email: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> Invitation {
        let now = Utc::now();

        Invitation {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            account_name: None,
            inviter_id: Uuid::new_v4(),
            inviter_name: None,
            invitee_email: "friend@example.com".to_owned(),
            token: generate_token(),
            status,
            expires_at: now + expires_in,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tokens_are_long_and_alphanumeric() {
        let token = generate_token();

        assert_eq!(TOKEN_LENGTH, token.len());
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn pending_invitation_can_be_answered() {
        let invitation = invitation(InvitationStatus::Pending, validity());

        assert_eq!(Ok(()), invitation.check_can_respond(Utc::now()));
    }

    #[test]
    fn expired_invitation_cannot_be_answered() {
        let invitation = invitation(InvitationStatus::Pending, Duration::seconds(-1));

        assert_eq!(
            Err(ResponseBlocker::Expired),
            invitation.check_can_respond(Utc::now())
        );
    }

    #[test]
    fn answered_invitation_cannot_be_answered_again() {
        let invitation = invitation(InvitationStatus::Declined, validity());

        let blocker = invitation.check_can_respond(Utc::now()).unwrap_err();

        assert_eq!("This invitation was already declined.", blocker.message());
    }

    #[test]
    fn address_match_ignores_case() {
        let invitation = invitation(InvitationStatus::Pending, validity());

        assert!(invitation.is_addressed_to("Friend@Example.com"));
        assert!(!invitation.is_addressed_to("stranger@example.com"));
    }
}
