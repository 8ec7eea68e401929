//! Guest-side consumer of a party's event stream
//!
//! The transport may redeliver or reorder messages, so playback snapshots
//! are applied only when strictly newer than the last one applied.

use crate::domain::entities::ChatMessage;
use crate::domain::services::{Correction, DriftCorrector, VideoPlayer};
use crate::domain::value_objects::{PartyEvent, PlaybackState};

/// Result of handling one event
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Snapshot applied to the local player
    Corrected(Correction),
    /// Duplicate, out-of-order, or for another party
    Ignored,
    /// Participant list changed; re-fetch the session
    ParticipantsChanged,
    Chat(ChatMessage),
    /// Party ended; leave the session
    Exit,
}

/// Per-party guest synchronization state
#[derive(Debug, Clone)]
pub struct GuestSync {
    party_id: String,
    last_applied_at: Option<i64>,
    corrector: DriftCorrector,
    exited: bool,
}

impl GuestSync {
    pub fn new(party_id: impl Into<String>) -> Self {
        Self::with_corrector(party_id, DriftCorrector::new())
    }

    pub fn with_corrector(party_id: impl Into<String>, corrector: DriftCorrector) -> Self {
        Self {
            party_id: party_id.into(),
            last_applied_at: None,
            corrector,
            exited: false,
        }
    }

    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    pub fn has_exited(&self) -> bool {
        self.exited
    }

    pub fn last_applied_at(&self) -> Option<i64> {
        self.last_applied_at
    }

    /// Apply the snapshot returned by join. Always hard-seeks.
    pub fn join<P: VideoPlayer + ?Sized>(
        &mut self,
        player: &mut P,
        initial: &PlaybackState,
    ) -> Correction {
        self.corrector.reset();
        self.last_applied_at = Some(initial.updated_at);
        self.corrector.reconcile(player, initial)
    }

    /// Handle one event from the party channel
    pub fn handle<P: VideoPlayer + ?Sized>(
        &mut self,
        player: &mut P,
        event: &PartyEvent,
    ) -> SyncOutcome {
        if self.exited {
            return SyncOutcome::Exit;
        }
        if event.party_id() != self.party_id {
            return SyncOutcome::Ignored;
        }

        match event {
            PartyEvent::PartyUpdated { playback, .. } if event.is_terminal() => {
                tracing::info!("Party {} ended, leaving session", self.party_id);
                if player.is_playing() {
                    player.pause();
                }
                self.exited = true;
                self.last_applied_at = Some(
                    self.last_applied_at
                        .map_or(playback.updated_at, |t| t.max(playback.updated_at)),
                );
                SyncOutcome::Exit
            }
            PartyEvent::PartyUpdated { playback, .. } => {
                if let Some(last) = self.last_applied_at {
                    if !playback.is_newer_than(last) {
                        tracing::trace!(
                            "Dropping stale snapshot {} (last applied {})",
                            playback.updated_at,
                            last
                        );
                        return SyncOutcome::Ignored;
                    }
                }
                self.last_applied_at = Some(playback.updated_at);
                SyncOutcome::Corrected(self.corrector.reconcile(player, playback))
            }
            PartyEvent::ParticipantsChanged { .. } => SyncOutcome::ParticipantsChanged,
            PartyEvent::ChatMessage { message, .. } => SyncOutcome::Chat(message.clone()),
        }
    }
}
