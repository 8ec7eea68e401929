//! Host-authoritative playback replication
//!
//! Each active party has one slot holding its committed snapshot, guarded
//! by a per-party async mutex so writes within a party are serialized while
//! parties never contend with each other.
//!
//! Throttled updates: the first update in a window commits immediately and
//! opens the window; later updates in the window overwrite a single pending
//! write, which a scheduled task commits when the window closes (opening the
//! next window). `sync_all` bypasses all of this.
//!
//! Any commit drops a pending write, so a stale coalesced value can never
//! land on top of a newer one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::entities::{Participant, Party, PartyStatus};
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::{validate_position, PartyEvent, PlaybackState};
use crate::infrastructure::services::PartyBroker;

/// Result of a throttled update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// Written and broadcast now
    Committed(PlaybackState),
    /// Held as the pending write for the current window
    Coalesced,
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    position: f64,
    is_playing: bool,
}

struct PartySlot {
    host_id: String,
    ended: bool,
    committed: PlaybackState,
    window_started: Option<Instant>,
    pending: Option<PendingWrite>,
    flush_task: Option<JoinHandle<()>>,
}

impl PartySlot {
    fn from_party(party: &Party) -> Self {
        Self {
            host_id: party.host_id.clone(),
            ended: party.status == PartyStatus::Ended,
            committed: party.playback(),
            window_started: None,
            pending: None,
            flush_task: None,
        }
    }

    fn authorize(&self, caller_id: &str) -> Result<(), PlaybackError> {
        if self.ended {
            return Err(PlaybackError::PartyEnded);
        }
        if self.host_id != caller_id {
            return Err(PlaybackError::Forbidden);
        }
        Ok(())
    }

    fn cancel_pending(&mut self) -> bool {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        self.pending.take().is_some()
    }
}

/// Holds and propagates the authoritative playback state of every party
pub struct PlaybackReplicator<P: PartyRepository + 'static> {
    party_repo: Arc<P>,
    broker: Arc<PartyBroker>,
    throttle_window: Duration,
    slots: parking_lot::Mutex<HashMap<String, Arc<Mutex<PartySlot>>>>,
}

impl<P: PartyRepository + 'static> PlaybackReplicator<P> {
    pub fn new(party_repo: Arc<P>, broker: Arc<PartyBroker>, throttle_window: Duration) -> Self {
        Self {
            party_repo,
            broker,
            throttle_window,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Throttled host update (continuous playback ticks)
    pub async fn update(
        &self,
        party_id: &str,
        caller_id: &str,
        position: f64,
        is_playing: bool,
    ) -> Result<UpdateOutcome, PlaybackError> {
        let position = validate_position(position).map_err(PlaybackError::Validation)?;
        let slot = self.slot(party_id).await?;
        let mut guard = slot.lock().await;
        guard.authorize(caller_id)?;
        self.ensure_present(party_id, caller_id).await?;

        let write = PendingWrite {
            position,
            is_playing,
        };
        let now = Instant::now();

        if let Some(started) = guard.window_started {
            let window_end = started + self.throttle_window;
            if now < window_end {
                guard.pending = Some(write);
                if guard.flush_task.is_none() {
                    guard.flush_task = Some(self.schedule_flush(party_id, slot.clone(), window_end));
                }
                tracing::trace!("Coalesced playback update for party {}", party_id);
                return Ok(UpdateOutcome::Coalesced);
            }
        }

        let state = commit(&mut guard, &*self.party_repo, &self.broker, party_id, write).await?;
        Ok(UpdateOutcome::Committed(state))
    }

    /// Immediate host broadcast (seeks). Supersedes any pending write.
    pub async fn sync_all(
        &self,
        party_id: &str,
        caller_id: &str,
        position: f64,
        is_playing: bool,
    ) -> Result<PlaybackState, PlaybackError> {
        let position = validate_position(position).map_err(PlaybackError::Validation)?;
        let slot = self.slot(party_id).await?;
        let mut guard = slot.lock().await;
        guard.authorize(caller_id)?;
        self.ensure_present(party_id, caller_id).await?;

        if guard.cancel_pending() {
            tracing::debug!("sync_all superseded pending write for party {}", party_id);
        }

        let write = PendingWrite {
            position,
            is_playing,
        };
        commit(&mut guard, &*self.party_repo, &self.broker, party_id, write).await
    }

    /// Drop a pending throttled write from `user_id` if they are the host.
    ///
    /// Returns true if a write was discarded.
    pub async fn cancel_pending(&self, party_id: &str, user_id: &str) -> bool {
        let Some(slot) = self.slots.lock().get(party_id).cloned() else {
            return false;
        };
        let mut guard = slot.lock().await;
        if guard.host_id != user_id {
            return false;
        }
        guard.cancel_pending()
    }

    /// Tear down a party's slot. No further writes are accepted through it.
    pub async fn close(&self, party_id: &str) {
        let slot = self.slots.lock().remove(party_id);
        if let Some(slot) = slot {
            let mut guard = slot.lock().await;
            guard.ended = true;
            guard.cancel_pending();
            tracing::debug!("Closed playback slot for party {}", party_id);
        }
    }

    /// Free a party's slot and event channel once nobody is present.
    ///
    /// The party stays active; a later join or write reloads it from the
    /// repository. Returns true if the party was released.
    pub async fn release_if_abandoned(&self, party_id: &str) -> Result<bool, RepositoryError> {
        let participants = self.party_repo.list_participants(party_id).await?;
        if participants.iter().any(Participant::is_present) {
            return Ok(false);
        }

        let slot = self.slots.lock().remove(party_id);
        if let Some(slot) = slot {
            slot.lock().await.cancel_pending();
        }
        self.broker.release(party_id);
        tracing::info!("Released abandoned party {}", party_id);
        Ok(true)
    }

    /// Last committed snapshot, if the party's slot is loaded
    pub async fn snapshot(&self, party_id: &str) -> Option<PlaybackState> {
        let slot = self.slots.lock().get(party_id).cloned()?;
        let guard = slot.lock().await;
        Some(guard.committed)
    }

    pub fn active_slots(&self) -> usize {
        self.slots.lock().len()
    }

    async fn slot(&self, party_id: &str) -> Result<Arc<Mutex<PartySlot>>, PlaybackError> {
        if let Some(slot) = self.slots.lock().get(party_id).cloned() {
            return Ok(slot);
        }

        let party = self
            .party_repo
            .find_by_id(party_id)
            .await?
            .ok_or(PlaybackError::PartyNotFound)?;
        if !party.is_active() {
            return Err(PlaybackError::PartyEnded);
        }

        let mut slots = self.slots.lock();
        Ok(slots
            .entry(party_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PartySlot::from_party(&party))))
            .clone())
    }

    /// The host keeps authority only while present in the party
    async fn ensure_present(&self, party_id: &str, caller_id: &str) -> Result<(), PlaybackError> {
        let present = self
            .party_repo
            .find_participant(party_id, caller_id)
            .await?
            .is_some_and(|p| p.is_present());
        if present {
            Ok(())
        } else {
            Err(PlaybackError::NotInParty)
        }
    }

    fn schedule_flush(
        &self,
        party_id: &str,
        slot: Arc<Mutex<PartySlot>>,
        deadline: Instant,
    ) -> JoinHandle<()> {
        let party_repo = self.party_repo.clone();
        let broker = self.broker.clone();
        let party_id = party_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let mut guard = slot.lock().await;
            guard.flush_task = None;
            if guard.ended {
                return;
            }
            if let Some(write) = guard.pending.take() {
                if let Err(e) = commit(&mut guard, &*party_repo, &broker, &party_id, write).await {
                    tracing::warn!("Failed to flush playback for party {}: {}", party_id, e);
                }
            }
        })
    }
}

/// Persist and broadcast a write, opening a new throttle window
async fn commit<P: PartyRepository + ?Sized>(
    slot: &mut PartySlot,
    party_repo: &P,
    broker: &PartyBroker,
    party_id: &str,
    write: PendingWrite,
) -> Result<PlaybackState, PlaybackError> {
    // Whatever was pending is older than this write
    if slot.cancel_pending() {
        tracing::trace!("Dropped superseded pending write for party {}", party_id);
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let state = PlaybackState {
        position: write.position,
        is_playing: write.is_playing,
        // Keep updated_at strictly increasing even within one millisecond
        updated_at: now_ms.max(slot.committed.updated_at + 1),
    };

    if !party_repo.update_playback(party_id, &state).await? {
        // Ended behind our back
        slot.ended = true;
        slot.cancel_pending();
        return Err(PlaybackError::PartyEnded);
    }

    slot.committed = state;
    slot.window_started = Some(Instant::now());

    tracing::debug!(
        "Committed playback for party {}: {:.3}s playing={}",
        party_id,
        state.position,
        state.is_playing
    );
    broker.publish(PartyEvent::PartyUpdated {
        party_id: party_id.to_string(),
        status: PartyStatus::Active,
        playback: state,
    });

    Ok(state)
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Party not found")]
    PartyNotFound,
    #[error("Only the host can control playback")]
    Forbidden,
    #[error("Not in party")]
    NotInParty,
    #[error("Party has ended")]
    PartyEnded,
    #[error("Validation error: {0}")]
    Validation(&'static str),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
