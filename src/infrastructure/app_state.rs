use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::infrastructure::auth::JwtService;
use crate::infrastructure::config::Config;
use crate::infrastructure::database::repositories::{SqliteChatRepository, SqlitePartyRepository};
use crate::infrastructure::database::connect;
use crate::infrastructure::services::{PartyBroker, PlaybackReplicator, PresenceTracker};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Database connection pool
    pub db: SqlitePool,

    /// JWT service for verifying caller identity
    pub jwt_service: Arc<JwtService>,

    pub party_repo: Arc<SqlitePartyRepository>,
    pub chat_repo: Arc<SqliteChatRepository>,

    /// Per-party event channels for SSE
    pub broker: Arc<PartyBroker>,

    /// Host playback writes (throttled and immediate)
    pub replicator: Arc<PlaybackReplicator<SqlitePartyRepository>>,

    /// Heartbeats and derived presence
    pub presence: Arc<PresenceTracker<SqlitePartyRepository>>,

    reaper: Option<Arc<JoinHandle<()>>>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(Config::from_env()).await
    }

    pub async fn with_config(config: Config) -> anyhow::Result<Self> {
        tracing::info!("Connecting to database: {}", config.database_url);

        let db = connect(&config).await?;

        let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));

        let party_repo = Arc::new(SqlitePartyRepository::new(db.clone()));
        let chat_repo = Arc::new(SqliteChatRepository::new(db.clone()));

        let broker = Arc::new(PartyBroker::new(config.event_channel_capacity));
        let replicator = Arc::new(PlaybackReplicator::new(
            party_repo.clone(),
            broker.clone(),
            config.throttle_window,
        ));
        let presence = Arc::new(PresenceTracker::new(
            party_repo.clone(),
            broker.clone(),
            replicator.clone(),
            config.liveness_window(),
            config.reap_after,
        ));

        let reaper = if config.reaper_enabled {
            tracing::info!(
                "Presence reaper enabled (every {:?}, after {:?})",
                config.reaper_interval,
                config.reap_after
            );
            Some(Arc::new(presence.clone().spawn_reaper(config.reaper_interval)))
        } else {
            tracing::info!("Presence reaper disabled");
            None
        };

        Ok(Self {
            config: Arc::new(config),
            db,
            jwt_service,
            party_repo,
            chat_repo,
            broker,
            replicator,
            presence,
            reaper,
        })
    }

    pub fn reaper_running(&self) -> bool {
        self.reaper.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop background tasks
    pub fn shutdown(&self) {
        if let Some(reaper) = &self.reaper {
            reaper.abort();
        }
    }
}
