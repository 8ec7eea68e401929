use axum::{http::StatusCode, response::Json};
use serde::Serialize;

use crate::domain::entities::{ChatMessage, Party};
use crate::domain::value_objects::PlaybackState;

/// Error body shared by every route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
            details: None,
        }),
    )
}

/// 500 with the underlying error in `details`
pub fn internal_error(code: &str, error: &str, details: impl ToString) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
            details: Some(details.to_string()),
        }),
    )
}

pub fn party_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "PARTY_NOT_FOUND", "Party not found")
}

pub fn party_ended() -> ApiError {
    api_error(StatusCode::GONE, "PARTY_ENDED", "Party has ended")
}

pub fn not_host() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "NOT_HOST", "Only the host can do this")
}

pub fn not_in_party() -> ApiError {
    api_error(StatusCode::FORBIDDEN, "NOT_IN_PARTY", "Not in party")
}

/// Convert Unix millis to an ISO 8601 string
pub fn millis_to_rfc3339(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyInfo {
    pub id: String,
    pub code: String,
    pub host_id: String,
    pub video_ref: String,
    pub status: String,
    pub created_at: String,
}

impl From<&Party> for PartyInfo {
    fn from(party: &Party) -> Self {
        Self {
            id: party.id.clone(),
            code: party.code.clone(),
            host_id: party.host_id.clone(),
            video_ref: party.video_ref.clone(),
            status: party.status.as_str().to_string(),
            created_at: millis_to_rfc3339(party.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageInfo {
    pub id: i64,
    pub user_id: String,
    pub text: String,
    pub created_at: i64,
}

impl From<ChatMessage> for ChatMessageInfo {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            user_id: message.user_id,
            text: message.text,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackResponse {
    pub success: bool,
    /// False when the update was coalesced into the pending write
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackState>,
}
