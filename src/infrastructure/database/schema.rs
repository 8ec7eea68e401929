//! Database connection and schema setup

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::infrastructure::config::Config;

/// Open the pool and create tables
pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    if !config.is_in_memory_db() {
        if let Some(dir) = options.get_filename().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
    }

    // Each in-memory connection is its own database, so pin to one
    let pool = if config.is_in_memory_db() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes if missing
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parties (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            host_id TEXT NOT NULL,
            video_ref TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            playback_position REAL NOT NULL DEFAULT 0,
            is_playing INTEGER NOT NULL DEFAULT 0,
            playback_updated_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            ended_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // A code is only reserved while its party is active
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_parties_active_code
        ON parties(code) WHERE status = 'active'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            party_id TEXT NOT NULL REFERENCES parties(id),
            user_id TEXT NOT NULL,
            joined_at INTEGER NOT NULL,
            left_at INTEGER,
            last_ping_at INTEGER NOT NULL,
            UNIQUE (party_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_participants_present
        ON participants(party_id) WHERE left_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            party_id TEXT NOT NULL REFERENCES parties(id),
            user_id TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_chat_messages_party
        ON chat_messages(party_id, created_at)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
