pub mod chat;
pub mod party;
