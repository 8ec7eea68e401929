use std::sync::Arc;

use crate::application::chat::ChatError;
use crate::domain::entities::ChatMessage;
use crate::domain::repositories::{ChatRepository, PartyRepository};

pub const DEFAULT_CHAT_BACKLOG: u32 = 50;
pub const MAX_CHAT_BACKLOG: u32 = 200;

/// List chat messages input
pub struct ListChatMessagesInput {
    pub user_id: String,
    pub party_id: String,
    pub limit: Option<u32>,
}

/// Recent chat backlog for a party, oldest first
pub struct ListChatMessages<P: PartyRepository, C: ChatRepository> {
    party_repo: Arc<P>,
    chat_repo: Arc<C>,
}

impl<P: PartyRepository, C: ChatRepository> ListChatMessages<P, C> {
    pub fn new(party_repo: Arc<P>, chat_repo: Arc<C>) -> Self {
        Self {
            party_repo,
            chat_repo,
        }
    }

    pub async fn execute(
        &self,
        input: ListChatMessagesInput,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let party = self
            .party_repo
            .find_by_id(&input.party_id)
            .await?
            .ok_or(ChatError::PartyNotFound)?;
        if !party.is_active() {
            return Err(ChatError::PartyEnded);
        }

        // Anyone with a participant row, present or not, may read history
        if self
            .party_repo
            .find_participant(&input.party_id, &input.user_id)
            .await?
            .is_none()
        {
            return Err(ChatError::NotInParty);
        }

        let limit = input
            .limit
            .unwrap_or(DEFAULT_CHAT_BACKLOG)
            .clamp(1, MAX_CHAT_BACKLOG);
        Ok(self.chat_repo.list_recent(&input.party_id, limit).await?)
    }
}
