mod list_chat_messages;
mod send_chat_message;

pub use list_chat_messages::*;
pub use send_chat_message::*;
