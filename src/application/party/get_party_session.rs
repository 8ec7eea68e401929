use std::sync::Arc;

use crate::domain::entities::{Participant, Party, Presence};
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::PlaybackState;

/// Get party session input
pub struct GetPartySessionInput {
    pub user_id: String,
    pub party_id: String,
}

/// Participant with derived presence
#[derive(Debug)]
pub struct ParticipantView {
    pub participant: Participant,
    pub presence: Presence,
}

/// Everything a client needs to render the session
#[derive(Debug)]
pub struct PartySession {
    pub party: Party,
    pub playback: PlaybackState,
    pub participants: Vec<ParticipantView>,
    /// Participants whose heartbeat is within the liveness window
    pub live_count: usize,
    pub is_host: bool,
}

/// Get party session use case
pub struct GetPartySession<P: PartyRepository> {
    party_repo: Arc<P>,
    liveness_window_ms: i64,
}

impl<P: PartyRepository> GetPartySession<P> {
    pub fn new(party_repo: Arc<P>, liveness_window_ms: i64) -> Self {
        Self {
            party_repo,
            liveness_window_ms,
        }
    }

    pub async fn execute(
        &self,
        input: GetPartySessionInput,
    ) -> Result<PartySession, GetPartySessionError> {
        let party = self
            .party_repo
            .find_by_id(&input.party_id)
            .await?
            .ok_or(GetPartySessionError::PartyNotFound)?;

        if !party.is_active() {
            return Err(GetPartySessionError::PartyEnded);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let participants: Vec<ParticipantView> = self
            .party_repo
            .list_participants(&input.party_id)
            .await?
            .into_iter()
            .map(|participant| {
                let presence = participant.presence(now, self.liveness_window_ms);
                ParticipantView {
                    participant,
                    presence,
                }
            })
            .collect();

        let live_count = participants
            .iter()
            .filter(|p| p.presence == Presence::Joined)
            .count();

        Ok(PartySession {
            is_host: party.is_host(&input.user_id),
            playback: party.playback(),
            party,
            participants,
            live_count,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GetPartySessionError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Party has ended")]
    PartyEnded,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
