use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::api::dto::{
    api_error, internal_error, millis_to_rfc3339, not_host, not_in_party, party_ended,
    party_not_found, ApiError, PartyInfo, PlaybackResponse,
};
use crate::api::middleware::Claims;
use crate::api::AppState;
use crate::application::party::{
    CreateParty, CreatePartyError, CreatePartyInput, EndParty, EndPartyError, EndPartyInput,
    GetPartySession, GetPartySessionError, GetPartySessionInput, JoinOutcome, JoinParty,
    JoinPartyError, JoinPartyInput, LeaveParty, LeavePartyError, LeavePartyInput,
};
use crate::domain::value_objects::PlaybackState;
use crate::infrastructure::services::{PlaybackError, PresenceError, UpdateOutcome};

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartyRequest {
    pub video_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinPartyRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackRequest {
    pub position: f64,
    pub is_playing: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatePartyResponse {
    pub success: bool,
    pub code: String,
    pub party: PartyInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPartyResponse {
    pub success: bool,
    pub party: PartyInfo,
    pub playback: PlaybackState,
    pub is_host: bool,
    pub rejoined: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub user_id: String,
    pub presence: String,
    pub joined_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<String>,
    pub last_ping_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySessionResponse {
    pub success: bool,
    pub party: PartyInfo,
    pub playback: PlaybackState,
    pub participants: Vec<ParticipantInfo>,
    pub live_count: usize,
    pub is_host: bool,
}

#[derive(Debug, Serialize)]
pub struct LeavePartyResponse {
    pub success: bool,
    pub left: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndPartyResponse {
    pub success: bool,
    pub ended_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ping_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_count: Option<usize>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn playback_error(e: PlaybackError) -> ApiError {
    match e {
        PlaybackError::PartyNotFound => party_not_found(),
        PlaybackError::Forbidden => not_host(),
        PlaybackError::NotInParty => not_in_party(),
        PlaybackError::PartyEnded => party_ended(),
        PlaybackError::Validation(msg) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_PLAYBACK", msg)
        }
        PlaybackError::Repository(e) => {
            internal_error("PERSISTENCE_ERROR", "Failed to update playback", e)
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/party - Create a party hosted by the caller
pub async fn create_party(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<CreatePartyRequest>,
) -> Result<(StatusCode, Json<CreatePartyResponse>), ApiError> {
    let use_case = CreateParty::new(state.party_repo.clone());
    let result = use_case
        .execute(CreatePartyInput {
            host_id: claims.user_id.clone(),
            video_ref: body.video_ref,
        })
        .await
        .map_err(|e| match e {
            CreatePartyError::Validation(msg) => {
                api_error(StatusCode::BAD_REQUEST, "MISSING_VIDEO_REF", msg)
            }
            e => internal_error("CREATE_PARTY_ERROR", "Failed to create party", e),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePartyResponse {
            success: true,
            code: result.party.code.clone(),
            party: PartyInfo::from(&result.party),
        }),
    ))
}

/// POST /api/party/join - Join an active party by code
pub async fn join_party(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<JoinPartyRequest>,
) -> Result<Json<JoinPartyResponse>, ApiError> {
    let use_case = JoinParty::new(state.party_repo.clone(), state.broker.clone());
    let result = use_case
        .execute(JoinPartyInput {
            user_id: claims.user_id.clone(),
            code: body.code,
        })
        .await
        .map_err(|e| match e {
            JoinPartyError::PartyNotFound => party_not_found(),
            JoinPartyError::Repository(e) => {
                internal_error("JOIN_PARTY_ERROR", "Failed to join party", e)
            }
        })?;

    Ok(Json(JoinPartyResponse {
        success: true,
        party: PartyInfo::from(&result.party),
        playback: result.playback,
        is_host: result.is_host,
        rejoined: result.outcome == JoinOutcome::Rejoined,
    }))
}

/// GET /api/party/:partyId - Current session view
pub async fn get_party_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
) -> Result<Json<PartySessionResponse>, ApiError> {
    let use_case = GetPartySession::new(
        state.party_repo.clone(),
        state.config.liveness_window().as_millis() as i64,
    );
    let session = use_case
        .execute(GetPartySessionInput {
            user_id: claims.user_id.clone(),
            party_id,
        })
        .await
        .map_err(|e| match e {
            GetPartySessionError::PartyNotFound => party_not_found(),
            GetPartySessionError::PartyEnded => party_ended(),
            GetPartySessionError::Repository(e) => {
                internal_error("GET_PARTY_ERROR", "Failed to load party", e)
            }
        })?;

    Ok(Json(PartySessionResponse {
        success: true,
        party: PartyInfo::from(&session.party),
        playback: session.playback,
        participants: session
            .participants
            .into_iter()
            .map(|view| ParticipantInfo {
                user_id: view.participant.user_id,
                presence: view.presence.as_str().to_string(),
                joined_at: millis_to_rfc3339(view.participant.joined_at),
                left_at: view.participant.left_at.map(millis_to_rfc3339),
                last_ping_at: view.participant.last_ping_at,
            })
            .collect(),
        live_count: session.live_count,
        is_host: session.is_host,
    }))
}

/// POST /api/party/:partyId/leave - Leave a party
pub async fn leave_party(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
) -> Result<Json<LeavePartyResponse>, ApiError> {
    let use_case = LeaveParty::new(
        state.party_repo.clone(),
        state.replicator.clone(),
        state.broker.clone(),
    );
    let result = use_case
        .execute(LeavePartyInput {
            user_id: claims.user_id.clone(),
            party_id,
        })
        .await
        .map_err(|e| match e {
            LeavePartyError::PartyNotFound => party_not_found(),
            LeavePartyError::PartyEnded => party_ended(),
            LeavePartyError::Repository(e) => {
                internal_error("LEAVE_PARTY_ERROR", "Failed to leave party", e)
            }
        })?;

    Ok(Json(LeavePartyResponse {
        success: true,
        left: result.left,
    }))
}

/// POST /api/party/:partyId/end - End the party (host only)
pub async fn end_party(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
) -> Result<Json<EndPartyResponse>, ApiError> {
    let use_case = EndParty::new(
        state.party_repo.clone(),
        state.replicator.clone(),
        state.broker.clone(),
    );
    let result = use_case
        .execute(EndPartyInput {
            user_id: claims.user_id.clone(),
            party_id,
        })
        .await
        .map_err(|e| match e {
            EndPartyError::PartyNotFound => party_not_found(),
            EndPartyError::Forbidden => not_host(),
            EndPartyError::PartyEnded => party_ended(),
            EndPartyError::Repository(e) => {
                internal_error("END_PARTY_ERROR", "Failed to end party", e)
            }
        })?;

    Ok(Json(EndPartyResponse {
        success: true,
        ended_at: millis_to_rfc3339(result.ended_at),
    }))
}

/// POST /api/party/:partyId/playback - Throttled host playback update
pub async fn update_playback(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
    Json(body): Json<PlaybackRequest>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let outcome = state
        .replicator
        .update(&party_id, &claims.user_id, body.position, body.is_playing)
        .await
        .map_err(playback_error)?;

    Ok(Json(match outcome {
        UpdateOutcome::Committed(playback) => PlaybackResponse {
            success: true,
            committed: true,
            playback: Some(playback),
        },
        UpdateOutcome::Coalesced => PlaybackResponse {
            success: true,
            committed: false,
            playback: None,
        },
    }))
}

/// POST /api/party/:partyId/sync - Immediate host broadcast (seek)
pub async fn sync_all(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
    Json(body): Json<PlaybackRequest>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let playback = state
        .replicator
        .sync_all(&party_id, &claims.user_id, body.position, body.is_playing)
        .await
        .map_err(playback_error)?;

    Ok(Json(PlaybackResponse {
        success: true,
        committed: true,
        playback: Some(playback),
    }))
}

/// POST /api/party/:partyId/ping - Presence heartbeat
pub async fn ping_presence(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(party_id): Path<String>,
) -> Result<Json<PingResponse>, ApiError> {
    match state.presence.ping(&party_id, &claims.user_id).await {
        Ok(outcome) => {
            let live_count = match state.presence.live_count(&party_id).await {
                Ok(count) => Some(count),
                Err(e) => {
                    tracing::warn!("Failed to count live participants in {}: {}", party_id, e);
                    None
                }
            };
            Ok(Json(PingResponse {
                success: true,
                last_ping_at: Some(outcome.last_ping_at),
                live_count,
            }))
        }
        Err(PresenceError::PartyNotFound) => Err(party_not_found()),
        Err(PresenceError::PartyEnded) => Err(party_ended()),
        Err(PresenceError::NotInParty) => Err(not_in_party()),
        Err(PresenceError::Repository(e)) => {
            // The next heartbeat will retry
            tracing::warn!(
                "Failed to record ping from {} in party {}: {}",
                claims.user_id,
                party_id,
                e
            );
            Ok(Json(PingResponse {
                success: false,
                last_ping_at: None,
                live_count: None,
            }))
        }
    }
}
