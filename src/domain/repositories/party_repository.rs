use async_trait::async_trait;

use crate::domain::entities::{Participant, Party};
use crate::domain::value_objects::PlaybackState;

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Database error: {0}")]
    Database(String),
}

/// Party and participant persistence.
///
/// Update methods return `false` when their row filter matched nothing, so
/// callers can tell "no-op" from "written".
#[async_trait]
pub trait PartyRepository: Send + Sync {
    // ========== Party operations ==========

    /// Find party by ID, in any status
    async fn find_by_id(&self, id: &str) -> Result<Option<Party>, RepositoryError>;

    /// Find the active party holding a join code
    async fn find_active_by_code(&self, code: &str) -> Result<Option<Party>, RepositoryError>;

    /// Insert a new party. `AlreadyExists` if its code is held by an active party.
    async fn insert(&self, party: &Party) -> Result<(), RepositoryError>;

    /// Write the playback snapshot of an active party
    async fn update_playback(
        &self,
        party_id: &str,
        playback: &PlaybackState,
    ) -> Result<bool, RepositoryError>;

    /// Move an active party to ended
    async fn end_party(&self, party_id: &str, ended_at: i64) -> Result<bool, RepositoryError>;

    // ========== Participant operations ==========

    /// Find the participant row for a (party, user) pair
    async fn find_participant(
        &self,
        party_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, RepositoryError>;

    /// Insert a participant row. `AlreadyExists` if the pair already has one.
    async fn insert_participant(&self, participant: &Participant) -> Result<(), RepositoryError>;

    /// Clear `left_at` on a left row and refresh its ping
    async fn rejoin_participant(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError>;

    /// Soft-close a present row
    async fn mark_left(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError>;

    /// Refresh `last_ping_at` on a present row
    async fn touch_ping(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError>;

    /// All participant rows of a party, oldest join first
    async fn list_participants(&self, party_id: &str) -> Result<Vec<Participant>, RepositoryError>;

    /// Soft-close present participants of active parties whose last ping is
    /// older than `cutoff`. Returns the rows that were closed.
    async fn reap_stale_participants(
        &self,
        cutoff: i64,
        now: i64,
    ) -> Result<Vec<Participant>, RepositoryError>;
}
