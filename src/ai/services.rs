use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{http_err::ApiError, repos::DynConversationRepo, service_err::ServiceError};

use super::{
    client::{ChatClient, ChatMessage, ProviderError},
    tools::{definitions, Toolbox},
    ChatData, ChatReply, ConversationMessage, Role,
};

/// How many earlier messages are sent along with a new one.
pub const HISTORY_LENGTH: i64 = 20;

/// How many times the model may call tools before it has to answer.
pub const MAX_TOOL_ROUNDS: usize = 5;

const SYSTEM_PROMPT: &str = "You are a helpful assistant inside a personal expense tracker. \
Answer questions about the user's accounts, transactions, budgets, saving goals and debts \
using the tools provided, and never invent figures. Amounts from tools are integers in \
minor units of the user's currency, so 1250 means 12.50. Dates use the YYYY-MM-DD format. \
Keep answers short.";

const GAVE_UP: &str = "Sorry, I couldn't finish that request. Could you try asking in a simpler way?";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no assistant provider is configured")]
    NotConfigured,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<anyhow::Error> for AiError {
    fn from(error: anyhow::Error) -> Self {
        Self::Service(error.into())
    }
}

impl From<ValidationErrors> for AiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Service(errors.into())
    }
}

impl From<AiError> for ApiError {
    fn from(error: AiError) -> Self {
        match error {
            AiError::NotConfigured => {
                Self::ServiceUnavailable("Assistant is not configured.".to_owned())
            }
            AiError::Provider(error) => {
                error!(?error, "Assistant provider request failed.");

                Self::BadGateway("The assistant is unavailable right now.".to_owned())
            }
            AiError::Service(error) => error.into(),
        }
    }
}

#[derive(Clone)]
pub struct AiService {
    conversation_repo: DynConversationRepo,
    client: Option<Arc<dyn ChatClient + Send + Sync>>,
    toolbox: Toolbox,
}

impl AiService {
    /// Without a client every chat request fails with
    /// [`AiError::NotConfigured`]; history can still be read and cleared.
    pub fn new(
        conversation_repo: DynConversationRepo,
        client: Option<Arc<dyn ChatClient + Send + Sync>>,
        toolbox: Toolbox,
    ) -> Self {
        Self {
            conversation_repo,
            client,
            toolbox,
        }
    }

    /// Answer a message from the user, calling tools as the model requests.
    ///
    /// The user's message and the final answer are saved to the history.
    /// Intermediate tool traffic is not.
    pub async fn chat(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        data: ChatData,
    ) -> Result<ChatReply, AiError> {
        data.validate()?;
        let client = self.client.as_ref().ok_or(AiError::NotConfigured)?;

        let history = self
            .conversation_repo
            .recent_messages(user_id, HISTORY_LENGTH)
            .await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::text(
            "system",
            format!("{} Today is {}.", SYSTEM_PROMPT, today),
        ));
        messages.extend(
            history
                .into_iter()
                .map(|message| ChatMessage::text(&message.role, message.content)),
        );
        messages.push(ChatMessage::text(Role::User.as_str(), data.message.clone()));

        let tools = definitions();
        let mut tools_used = Vec::new();
        let mut answer = None;

        for round in 0..=MAX_TOOL_ROUNDS {
            let reply = client.complete(&messages, &tools).await?;
            if reply.tool_calls.is_empty() {
                answer = Some(reply.content.unwrap_or_default());
                break;
            }
            if round == MAX_TOOL_ROUNDS {
                break;
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);
            for call in calls {
                let result = self
                    .toolbox
                    .call(user_id, today, &call.function.name, &call.function.arguments)
                    .await;
                messages.push(ChatMessage::tool_result(&call.id, &result));
                tools_used.push(call.function.name);
            }
        }

        let reply = answer.unwrap_or_else(|| {
            warn!(%user_id, "Assistant did not answer within the tool round limit.");

            GAVE_UP.to_owned()
        });

        self.conversation_repo
            .append_message(user_id, Role::User, &data.message)
            .await?;
        self.conversation_repo
            .append_message(user_id, Role::Assistant, &reply)
            .await?;

        info!(%user_id, tools = tools_used.len(), "Assistant answered.");

        Ok(ChatReply { reply, tools_used })
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<ConversationMessage>, AiError> {
        Ok(self
            .conversation_repo
            .recent_messages(user_id, HISTORY_LENGTH)
            .await?)
    }

    pub async fn clear_history(&self, user_id: Uuid) -> Result<(), AiError> {
        self.conversation_repo.clear_history(user_id).await?;

        info!(%user_id, "Cleared assistant history.");

        Ok(())
    }
}
