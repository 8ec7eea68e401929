pub mod chat;
pub mod health;
pub mod party;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::middleware::auth_middleware;
use crate::api::sse;
use crate::api::AppState;

/// Create the main API router
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/party", create_party_router(state.clone()))
        .route("/health", get(health::health_handler))
        .with_state(state)
}

/// Create party router
fn create_party_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(party::create_party))
        .route("/join", post(party::join_party))
        .route("/:partyId", get(party::get_party_session))
        .route("/:partyId/leave", post(party::leave_party))
        .route("/:partyId/end", post(party::end_party))
        .route("/:partyId/playback", post(party::update_playback))
        .route("/:partyId/sync", post(party::sync_all))
        .route("/:partyId/ping", post(party::ping_presence))
        .route(
            "/:partyId/chat",
            get(chat::list_chat_messages).post(chat::send_chat_message),
        )
        // Everything above requires a bearer token
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // EventSource cannot set headers; the token comes in the query string
        .route("/:partyId/events", get(sse::party_events_handler))
        .with_state(state)
}
