mod chat_message;
mod participant;
mod party;

pub use chat_message::*;
pub use participant::*;
pub use party::*;
