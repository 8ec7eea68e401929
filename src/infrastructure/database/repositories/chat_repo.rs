use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::entities::ChatMessage;
use crate::domain::repositories::{ChatRepository, RepositoryError};

/// SQLite implementation of ChatRepository
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> ChatMessage {
        use sqlx::Row;

        ChatMessage {
            id: row.get("id"),
            party_id: row.get("party_id"),
            user_id: row.get("user_id"),
            text: row.get("text"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO chat_messages (party_id, user_id, text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&message.party_id)
        .bind(&message.user_id)
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            ..message.clone()
        })
    }

    async fn list_recent(
        &self,
        party_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages WHERE party_id = ?
                ORDER BY created_at DESC, id DESC LIMIT ?
            ) ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(party_id)
        .bind(limit as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_message).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Party;
    use crate::domain::repositories::PartyRepository;
    use crate::infrastructure::config::Config;
    use crate::infrastructure::database::connect;
    use crate::infrastructure::database::repositories::SqlitePartyRepository;

    #[tokio::test]
    async fn test_list_recent_is_oldest_first() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let pool = connect(&config).await.unwrap();
        SqlitePartyRepository::new(pool.clone())
            .insert(&Party::new("p1".into(), "ABC234".into(), "host".into(), "v".into()))
            .await
            .unwrap();
        let repo = SqliteChatRepository::new(pool);

        for (i, text) in ["one", "two", "three"].into_iter().enumerate() {
            let mut message = ChatMessage::new("p1".into(), "host".into(), text.into());
            message.created_at = i as i64;
            let stored = repo.append(&message).await.unwrap();
            assert!(stored.id > 0);
        }

        let recent = repo.list_recent("p1", 2).await.unwrap();
        let texts: Vec<&str> = recent.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["two", "three"]);
        assert!(repo.list_recent("other", 10).await.unwrap().is_empty());
    }
}
