mod chat_repository;
mod party_repository;

pub use chat_repository::*;
pub use party_repository::*;
