use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    /// Parties with an open event channel
    open_channels: usize,
    /// Parties with a loaded playback slot
    playback_slots: usize,
    reaper_running: bool,
}

static START_TIME: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(std::time::Instant::now);
    let uptime = start.elapsed().as_secs();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        open_channels: state.broker.channel_count(),
        playback_slots: state.replicator.active_slots(),
        reaper_running: state.reaper_running(),
    })
}
