use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::entities::{Participant, Party, PartyStatus};
use crate::domain::repositories::{PartyRepository, RepositoryError};
use crate::domain::value_objects::PlaybackState;

/// SQLite implementation of PartyRepository
pub struct SqlitePartyRepository {
    pool: SqlitePool,
}

impl SqlitePartyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_party(row: &sqlx::sqlite::SqliteRow) -> Party {
        use sqlx::Row;

        let status_str: String = row.get("status");

        Party {
            id: row.get("id"),
            code: row.get("code"),
            host_id: row.get("host_id"),
            video_ref: row.get("video_ref"),
            // Unknown status is treated as terminal so it can never be mutated
            status: PartyStatus::from_str(&status_str).unwrap_or(PartyStatus::Ended),
            playback_position: row.get("playback_position"),
            is_playing: row.get::<i32, _>("is_playing") != 0,
            playback_updated_at: row.get("playback_updated_at"),
            created_at: row.get("created_at"),
            ended_at: row.get("ended_at"),
        }
    }

    fn row_to_participant(row: &sqlx::sqlite::SqliteRow) -> Participant {
        use sqlx::Row;

        Participant {
            id: row.get("id"),
            party_id: row.get("party_id"),
            user_id: row.get("user_id"),
            joined_at: row.get("joined_at"),
            left_at: row.get("left_at"),
            last_ping_at: row.get("last_ping_at"),
        }
    }

    fn map_insert_error(e: sqlx::Error, what: String) -> RepositoryError {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::AlreadyExists(what)
            }
            _ => RepositoryError::Database(e.to_string()),
        }
    }
}

#[async_trait]
impl PartyRepository for SqlitePartyRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Party>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM parties WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(row.as_ref().map(Self::row_to_party))
    }

    async fn find_active_by_code(&self, code: &str) -> Result<Option<Party>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM parties WHERE code = ? AND status = 'active'")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(row.as_ref().map(Self::row_to_party))
    }

    async fn insert(&self, party: &Party) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO parties (id, code, host_id, video_ref, status, playback_position, is_playing, playback_updated_at, created_at, ended_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&party.id)
        .bind(&party.code)
        .bind(&party.host_id)
        .bind(&party.video_ref)
        .bind(party.status.as_str())
        .bind(party.playback_position)
        .bind(party.is_playing as i32)
        .bind(party.playback_updated_at)
        .bind(party.created_at)
        .bind(party.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, format!("party code {}", party.code)))?;

        Ok(())
    }

    async fn update_playback(
        &self,
        party_id: &str,
        playback: &PlaybackState,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE parties
            SET playback_position = ?, is_playing = ?, playback_updated_at = ?
            WHERE id = ? AND status = 'active'
            "#,
        )
        .bind(playback.position)
        .bind(playback.is_playing as i32)
        .bind(playback.updated_at)
        .bind(party_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn end_party(&self, party_id: &str, ended_at: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE parties SET status = 'ended', is_playing = 0, ended_at = ? WHERE id = ? AND status = 'active'",
        )
        .bind(ended_at)
        .bind(party_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_participant(
        &self,
        party_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM participants WHERE party_id = ? AND user_id = ?")
            .bind(party_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(row.as_ref().map(Self::row_to_participant))
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO participants (party_id, user_id, joined_at, left_at, last_ping_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&participant.party_id)
        .bind(&participant.user_id)
        .bind(participant.joined_at)
        .bind(participant.left_at)
        .bind(participant.last_ping_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Self::map_insert_error(
                e,
                format!("participant {} in {}", participant.user_id, participant.party_id),
            )
        })?;

        Ok(())
    }

    async fn rejoin_participant(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE participants SET left_at = NULL, last_ping_at = ? WHERE party_id = ? AND user_id = ? AND left_at IS NOT NULL",
        )
        .bind(now)
        .bind(party_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_left(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE participants SET left_at = ? WHERE party_id = ? AND user_id = ? AND left_at IS NULL",
        )
        .bind(now)
        .bind(party_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_ping(
        &self,
        party_id: &str,
        user_id: &str,
        now: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE participants SET last_ping_at = ? WHERE party_id = ? AND user_id = ? AND left_at IS NULL",
        )
        .bind(now)
        .bind(party_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_participants(&self, party_id: &str) -> Result<Vec<Participant>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM participants WHERE party_id = ? ORDER BY joined_at ASC, id ASC",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_participant).collect())
    }

    async fn reap_stale_participants(
        &self,
        cutoff: i64,
        now: i64,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            UPDATE participants SET left_at = ?
            WHERE left_at IS NULL
              AND last_ping_at < ?
              AND party_id IN (SELECT id FROM parties WHERE status = 'active')
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_participant).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::Config;
    use crate::infrastructure::database::connect;

    async fn repo() -> SqlitePartyRepository {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        SqlitePartyRepository::new(connect(&config).await.unwrap())
    }

    fn party(id: &str, code: &str) -> Party {
        Party::new(id.into(), code.into(), "host".into(), "video".into())
    }

    #[tokio::test]
    async fn test_active_code_is_unique_until_party_ends() {
        let repo = repo().await;
        repo.insert(&party("p1", "ABC234")).await.unwrap();

        let err = repo.insert(&party("p2", "ABC234")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));

        assert!(repo.end_party("p1", 1).await.unwrap());
        assert!(!repo.end_party("p1", 2).await.unwrap());
        assert!(repo.find_active_by_code("ABC234").await.unwrap().is_none());

        // Code is free again once its party ended
        repo.insert(&party("p2", "ABC234")).await.unwrap();
        let found = repo.find_active_by_code("ABC234").await.unwrap().unwrap();
        assert_eq!(found.id, "p2");
    }

    #[tokio::test]
    async fn test_playback_round_trip_and_ended_guard() {
        let repo = repo().await;
        repo.insert(&party("p1", "ABC234")).await.unwrap();

        let state = PlaybackState::new(42.3, true, 1_700_000_000_123);
        assert!(repo.update_playback("p1", &state).await.unwrap());
        assert_eq!(repo.find_by_id("p1").await.unwrap().unwrap().playback(), state);

        repo.end_party("p1", 5).await.unwrap();
        let stored = repo.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(stored.status, PartyStatus::Ended);
        assert!(!stored.is_playing);
        assert_eq!(stored.ended_at, Some(5));
        assert!(!repo.update_playback("p1", &state).await.unwrap());
    }

    #[tokio::test]
    async fn test_participant_row_is_reused() {
        let repo = repo().await;
        repo.insert(&party("p1", "ABC234")).await.unwrap();
        repo.insert_participant(&Participant::new("p1".into(), "guest".into()))
            .await
            .unwrap();

        let err = repo
            .insert_participant(&Participant::new("p1".into(), "guest".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));

        assert!(!repo.rejoin_participant("p1", "guest", 10).await.unwrap());
        assert!(repo.mark_left("p1", "guest", 20).await.unwrap());
        assert!(!repo.mark_left("p1", "guest", 30).await.unwrap());
        assert!(!repo.touch_ping("p1", "guest", 30).await.unwrap());
        assert!(repo.rejoin_participant("p1", "guest", 40).await.unwrap());

        let rows = repo.list_participants("p1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].left_at, None);
        assert_eq!(rows[0].last_ping_at, 40);
    }

    #[tokio::test]
    async fn test_reap_only_touches_stale_rows_of_active_parties() {
        let repo = repo().await;
        repo.insert(&party("live", "ABC234")).await.unwrap();
        repo.insert(&party("over", "XYZ789")).await.unwrap();

        for (party_id, user_id, last_ping_at) in [
            ("live", "fresh", 1_000),
            ("live", "stale", 10),
            ("over", "stale", 10),
        ] {
            let mut participant = Participant::new(party_id.into(), user_id.into());
            participant.last_ping_at = last_ping_at;
            repo.insert_participant(&participant).await.unwrap();
        }
        repo.end_party("over", 1).await.unwrap();

        let reaped = repo.reap_stale_participants(500, 2_000).await.unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].party_id, "live");
        assert_eq!(reaped[0].user_id, "stale");
        assert_eq!(reaped[0].left_at, Some(2_000));

        let over = repo.find_participant("over", "stale").await.unwrap().unwrap();
        assert!(over.left_at.is_none());
    }
}
