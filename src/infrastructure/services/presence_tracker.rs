//! Heartbeat-based presence
//!
//! Two liveness tiers: an explicit leave soft-closes the participant row,
//! while a missing heartbeat only makes it *stale* (derived, advisory).
//! The optional reaper turns long-stale rows into left ones.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::entities::{Participant, Presence};
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::{ParticipantAction, PartyEvent};
use crate::infrastructure::services::{PartyBroker, PlaybackReplicator};

/// Result of a successful ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOutcome {
    pub last_ping_at: i64,
    /// The participant was stale before this ping
    pub revived: bool,
}

/// Tracks which participants are actually connected
pub struct PresenceTracker<P: PartyRepository + 'static> {
    party_repo: Arc<P>,
    broker: Arc<PartyBroker>,
    replicator: Arc<PlaybackReplicator<P>>,
    liveness_window: Duration,
    reap_after: Duration,
}

impl<P: PartyRepository + 'static> PresenceTracker<P> {
    pub fn new(
        party_repo: Arc<P>,
        broker: Arc<PartyBroker>,
        replicator: Arc<PlaybackReplicator<P>>,
        liveness_window: Duration,
        reap_after: Duration,
    ) -> Self {
        Self {
            party_repo,
            broker,
            replicator,
            liveness_window,
            reap_after,
        }
    }

    pub fn liveness_window_ms(&self) -> i64 {
        self.liveness_window.as_millis() as i64
    }

    /// Record a heartbeat from a present participant
    pub async fn ping(&self, party_id: &str, user_id: &str) -> Result<PingOutcome, PresenceError> {
        let party = self
            .party_repo
            .find_by_id(party_id)
            .await?
            .ok_or(PresenceError::PartyNotFound)?;
        if !party.is_active() {
            return Err(PresenceError::PartyEnded);
        }

        let participant = self
            .party_repo
            .find_participant(party_id, user_id)
            .await?
            .filter(Participant::is_present)
            .ok_or(PresenceError::NotInParty)?;

        let now = chrono::Utc::now().timestamp_millis();
        let was_stale = participant.presence(now, self.liveness_window_ms()) == Presence::Stale;

        // A leave can race us between the read and the write
        if !self.party_repo.touch_ping(party_id, user_id, now).await? {
            return Err(PresenceError::NotInParty);
        }

        if was_stale {
            tracing::debug!("Participant {} in party {} is live again", user_id, party_id);
            self.broker.publish(PartyEvent::ParticipantsChanged {
                party_id: party_id.to_string(),
                user_id: user_id.to_string(),
                action: ParticipantAction::Revived,
            });
        }

        Ok(PingOutcome {
            last_ping_at: now,
            revived: was_stale,
        })
    }

    /// Number of live participants in a party
    pub async fn live_count(&self, party_id: &str) -> Result<usize, RepositoryError> {
        let now = chrono::Utc::now().timestamp_millis();
        let window = self.liveness_window_ms();
        Ok(self
            .party_repo
            .list_participants(party_id)
            .await?
            .iter()
            .filter(|p| p.presence(now, window) == Presence::Joined)
            .count())
    }

    /// Soft-close participants whose heartbeat is older than `reap_after`.
    ///
    /// Parties left with nobody present are released.
    pub async fn reap_once(&self) -> Result<usize, RepositoryError> {
        let now = chrono::Utc::now().timestamp_millis();
        let cutoff = now - self.reap_after.as_millis() as i64;

        let reaped = self.party_repo.reap_stale_participants(cutoff, now).await?;
        let mut touched = BTreeSet::new();
        for participant in &reaped {
            tracing::info!(
                "Reaped stale participant {} from party {}",
                participant.user_id,
                participant.party_id
            );
            self.broker.publish(PartyEvent::ParticipantsChanged {
                party_id: participant.party_id.clone(),
                user_id: participant.user_id.clone(),
                action: ParticipantAction::Reaped,
            });
            touched.insert(participant.party_id.as_str());
        }
        for party_id in touched {
            self.replicator.release_if_abandoned(party_id).await?;
        }
        Ok(reaped.len())
    }

    /// Run `reap_once` every `interval` until the handle is aborted
    pub fn spawn_reaper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.reap_once().await {
                    tracing::warn!("Presence reaper failed: {}", e);
                }
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Party has ended")]
    PartyEnded,
    #[error("Not in party")]
    NotInParty,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
