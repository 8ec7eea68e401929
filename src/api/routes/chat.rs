use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::api::dto::{
    api_error, internal_error, not_in_party, party_ended, party_not_found, ApiError,
    ChatMessageInfo,
};
use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::application::chat::{
    ChatError, ListChatMessages, ListChatMessagesInput, SendChatMessage, SendChatMessageInput,
};

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatBacklogQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SendChatResponse {
    pub success: bool,
    pub message: ChatMessageInfo,
}

#[derive(Debug, Serialize)]
pub struct ChatBacklogResponse {
    pub success: bool,
    pub messages: Vec<ChatMessageInfo>,
}

fn chat_error(e: ChatError) -> ApiError {
    match e {
        ChatError::Validation(msg) => api_error(StatusCode::BAD_REQUEST, "INVALID_MESSAGE", msg),
        ChatError::PartyNotFound => party_not_found(),
        ChatError::PartyEnded => party_ended(),
        ChatError::NotInParty => not_in_party(),
        ChatError::Repository(e) => internal_error("CHAT_ERROR", "Chat storage failed", e),
    }
}

/// POST /api/party/:partyId/chat - Post a chat message
pub async fn send_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
    Json(body): Json<SendChatRequest>,
) -> Result<(StatusCode, Json<SendChatResponse>), ApiError> {
    let use_case = SendChatMessage::new(
        state.party_repo.clone(),
        state.chat_repo.clone(),
        state.broker.clone(),
    );
    let message = use_case
        .execute(SendChatMessageInput {
            user_id: claims.user_id.clone(),
            party_id,
            text: body.text,
        })
        .await
        .map_err(chat_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SendChatResponse {
            success: true,
            message: message.into(),
        }),
    ))
}

/// GET /api/party/:partyId/chat - Recent chat backlog
pub async fn list_chat_messages(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
    Query(query): Query<ChatBacklogQuery>,
) -> Result<Json<ChatBacklogResponse>, ApiError> {
    let use_case = ListChatMessages::new(state.party_repo.clone(), state.chat_repo.clone());
    let messages = use_case
        .execute(ListChatMessagesInput {
            user_id: claims.user_id.clone(),
            party_id,
            limit: query.limit,
        })
        .await
        .map_err(chat_error)?;

    Ok(Json(ChatBacklogResponse {
        success: true,
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}
