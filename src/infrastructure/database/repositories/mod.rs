mod chat_repo;
mod memory_repo;
mod party_repo;

pub use chat_repo::SqliteChatRepository;
pub use memory_repo::{InMemoryChatRepository, InMemoryPartyRepository};
pub use party_repo::SqlitePartyRepository;
