use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_broadcast::RecvError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;

use crate::api::dto::{
    api_error, internal_error, not_in_party, party_ended, party_not_found, ApiError,
};
use crate::domain::entities::PartyStatus;
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::PartyEvent;
use crate::infrastructure::app_state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Deserialize)]
pub struct SseParams {
    token: Option<String>,
}

fn to_sse_event(event: &PartyEvent) -> Option<Event> {
    match Event::default().event(event.event_name()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!("Failed to serialize {} event: {}", event.event_name(), e);
            None
        }
    }
}

/// GET /api/party/:partyId/events - Party event stream.
///
/// Opens with a `partyUpdated` snapshot so late subscribers start from the
/// current state, then relays the party channel until the party ends.
pub async fn party_events_handler(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
    Query(params): Query<SseParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let claims = params
        .token
        .as_deref()
        .and_then(|token| state.jwt_service.verify(token).ok())
        .ok_or_else(|| {
            api_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid or missing token")
        })?;

    let load_error =
        |e: RepositoryError| internal_error("SUBSCRIBE_ERROR", "Failed to load party", e);
    let party = state
        .party_repo
        .find_by_id(&party_id)
        .await
        .map_err(load_error)?
        .ok_or_else(party_not_found)?;
    if !party.is_active() {
        return Err(party_ended());
    }
    let present = state
        .party_repo
        .find_participant(&party_id, &claims.user_id)
        .await
        .map_err(load_error)?
        .is_some_and(|p| p.is_present());
    if !present {
        return Err(not_in_party());
    }

    // Subscribe before reading the snapshot so nothing falls in between
    let mut receiver = state.broker.subscribe(&party_id);

    // The party may have ended between the check above and subscribing
    let still_active = state
        .party_repo
        .find_by_id(&party_id)
        .await
        .map_err(load_error)?
        .is_some_and(|p| p.is_active());
    if !still_active {
        return Err(party_ended());
    }
    let playback = state
        .replicator
        .snapshot(&party_id)
        .await
        .unwrap_or_else(|| party.playback());
    let initial = PartyEvent::PartyUpdated {
        party_id: party_id.clone(),
        status: PartyStatus::Active,
        playback,
    };

    let user_id = claims.user_id;
    let stream = async_stream::stream! {
        tracing::debug!("SSE stream started for {} in party {}", user_id, party_id);

        if let Some(event) = to_sse_event(&initial) {
            yield Ok(event);
        }

        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    if let Some(sse) = to_sse_event(&event) {
                        yield Ok(sse);
                    }
                    if terminal {
                        break;
                    }
                }
                Err(RecvError::Overflowed(missed)) => {
                    // Client recovers by re-fetching the session
                    tracing::warn!(
                        "SSE subscriber {} in party {} missed {} events",
                        user_id,
                        party_id,
                        missed
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::debug!("SSE stream ended for {} in party {}", user_id, party_id);
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    ))
}
