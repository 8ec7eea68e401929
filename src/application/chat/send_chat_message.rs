use std::sync::Arc;

use crate::domain::entities::{ChatMessage, MAX_CHAT_MESSAGE_CHARS};
use crate::domain::repositories::{ChatRepository, PartyRepository, RepositoryError};
use crate::domain::value_objects::PartyEvent;
use crate::infrastructure::services::PartyBroker;

/// Send chat message input
pub struct SendChatMessageInput {
    pub user_id: String,
    pub party_id: String,
    pub text: String,
}

/// Send chat message use case
pub struct SendChatMessage<P: PartyRepository, C: ChatRepository> {
    party_repo: Arc<P>,
    chat_repo: Arc<C>,
    broker: Arc<PartyBroker>,
}

impl<P: PartyRepository, C: ChatRepository> SendChatMessage<P, C> {
    pub fn new(party_repo: Arc<P>, chat_repo: Arc<C>, broker: Arc<PartyBroker>) -> Self {
        Self {
            party_repo,
            chat_repo,
            broker,
        }
    }

    pub async fn execute(&self, input: SendChatMessageInput) -> Result<ChatMessage, ChatError> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("Message text is required".into()));
        }
        if text.chars().count() > MAX_CHAT_MESSAGE_CHARS {
            return Err(ChatError::Validation(format!(
                "Message exceeds {} characters",
                MAX_CHAT_MESSAGE_CHARS
            )));
        }

        let party = self
            .party_repo
            .find_by_id(&input.party_id)
            .await?
            .ok_or(ChatError::PartyNotFound)?;
        if !party.is_active() {
            return Err(ChatError::PartyEnded);
        }

        let present = self
            .party_repo
            .find_participant(&input.party_id, &input.user_id)
            .await?
            .is_some_and(|p| p.is_present());
        if !present {
            return Err(ChatError::NotInParty);
        }

        let message = self
            .chat_repo
            .append(&ChatMessage::new(
                input.party_id.clone(),
                input.user_id,
                text.to_string(),
            ))
            .await?;

        self.broker.publish(PartyEvent::ChatMessage {
            party_id: input.party_id,
            message: message.clone(),
        });

        Ok(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Party not found")]
    PartyNotFound,
    #[error("Party has ended")]
    PartyEnded,
    #[error("Not in party")]
    NotInParty,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
