use std::sync::Arc;

use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::{ParticipantAction, PartyEvent};
use crate::infrastructure::services::{PartyBroker, PlaybackReplicator};

/// Leave party input
pub struct LeavePartyInput {
    pub user_id: String,
    pub party_id: String,
}

/// Leave party output
#[derive(Debug)]
pub struct LeavePartyOutput {
    /// False if the caller had already left (or never joined)
    pub left: bool,
    /// A pending throttled host write was dropped
    pub cancelled_pending_write: bool,
}

/// Leave party use case
pub struct LeaveParty<P: PartyRepository + 'static> {
    party_repo: Arc<P>,
    replicator: Arc<PlaybackReplicator<P>>,
    broker: Arc<PartyBroker>,
}

impl<P: PartyRepository + 'static> LeaveParty<P> {
    pub fn new(
        party_repo: Arc<P>,
        replicator: Arc<PlaybackReplicator<P>>,
        broker: Arc<PartyBroker>,
    ) -> Self {
        Self {
            party_repo,
            replicator,
            broker,
        }
    }

    pub async fn execute(
        &self,
        input: LeavePartyInput,
    ) -> Result<LeavePartyOutput, LeavePartyError> {
        let party = self
            .party_repo
            .find_by_id(&input.party_id)
            .await?
            .ok_or(LeavePartyError::PartyNotFound)?;

        if !party.is_active() {
            return Err(LeavePartyError::PartyEnded);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let left = self
            .party_repo
            .mark_left(&input.party_id, &input.user_id, now)
            .await?;

        // After mark_left, so no new write from the departed host can be queued
        let cancelled_pending_write = party.is_host(&input.user_id)
            && self
                .replicator
                .cancel_pending(&input.party_id, &input.user_id)
                .await;
        if cancelled_pending_write {
            tracing::debug!("Dropped pending playback write for departing host of {}", party.id);
        }

        if left {
            tracing::info!("User {} left party {}", input.user_id, input.party_id);
            self.broker.publish(PartyEvent::ParticipantsChanged {
                party_id: input.party_id.clone(),
                user_id: input.user_id.clone(),
                action: ParticipantAction::Left,
            });
            self.replicator.release_if_abandoned(&input.party_id).await?;
        }

        Ok(LeavePartyOutput {
            left,
            cancelled_pending_write,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LeavePartyError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Party has ended")]
    PartyEnded,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
