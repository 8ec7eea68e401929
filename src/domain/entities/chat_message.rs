use serde::{Deserialize, Serialize};

/// Maximum chat message length in characters
pub const MAX_CHAT_MESSAGE_CHARS: usize = 1000;

/// Chat message entity (append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub party_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: i64,
}

impl ChatMessage {
    pub fn new(party_id: String, user_id: String, text: String) -> Self {
        Self {
            id: 0, // Set by database
            party_id,
            user_id,
            text,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
