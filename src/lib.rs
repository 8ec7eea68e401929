pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::infrastructure::app_state::AppState;

/// Build the full HTTP application
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api::routes::create_api_router(state.clone()))
        .route("/health", axum::routing::get(api::routes::health::health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
