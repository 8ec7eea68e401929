use async_trait::async_trait;

use crate::domain::entities::ChatMessage;
use crate::domain::repositories::RepositoryError;

/// Append-only chat storage
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Append a message, returning it with its assigned ID
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage, RepositoryError>;

    /// Most recent messages of a party, returned oldest first
    async fn list_recent(
        &self,
        party_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;
}
