use std::time::Duration;

/// Upper bound for presence durations read from the environment
const MAX_PRESENCE_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Runtime configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    /// Coalescing window for host playback updates
    pub throttle_window: Duration,
    /// Expected client heartbeat interval
    pub heartbeat_interval: Duration,
    /// Liveness window = heartbeat interval * multiplier
    pub liveness_multiplier: u32,
    pub reaper_enabled: bool,
    pub reaper_interval: Duration,
    /// Heartbeat age after which the reaper soft-closes a participant
    pub reap_after: Duration,
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/watch_party.db".to_string(),
            jwt_secret: "watch-party-secret-key-change-in-production".to_string(),
            port: 9999,
            throttle_window: Duration::from_millis(1000),
            heartbeat_interval: Duration::from_secs(30),
            liveness_multiplier: 3,
            reaper_enabled: true,
            reaper_interval: Duration::from_secs(60),
            reap_after: Duration::from_secs(600),
            event_channel_capacity: 256,
        }
    }
}

impl Config {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let db_path = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_PATH"))
            .unwrap_or(defaults.database_url);

        // Ensure path has sqlite: prefix
        let database_url = if db_path.starts_with("sqlite:") {
            db_path
        } else {
            format!("sqlite:{}", db_path)
        };

        Self {
            database_url,
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            port: env_parse("PORT").unwrap_or(defaults.port),
            throttle_window: env_parse("THROTTLE_WINDOW_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.throttle_window),
            heartbeat_interval: env_parse("HEARTBEAT_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            liveness_multiplier: env_parse("LIVENESS_MULTIPLIER")
                .filter(|m: &u32| *m > 0)
                .unwrap_or(defaults.liveness_multiplier),
            reaper_enabled: env_parse("REAPER_ENABLED").unwrap_or(defaults.reaper_enabled),
            reaper_interval: env_parse("REAPER_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reaper_interval),
            reap_after: env_parse("REAP_AFTER_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reap_after)
                .min(MAX_PRESENCE_WINDOW),
            event_channel_capacity: env_parse("EVENT_CHANNEL_CAPACITY")
                .filter(|c: &usize| *c > 0)
                .unwrap_or(defaults.event_channel_capacity),
        }
    }

    /// Heartbeat age beyond which a participant counts as stale
    pub fn liveness_window(&self) -> Duration {
        self.heartbeat_interval
            .checked_mul(self.liveness_multiplier)
            .unwrap_or(MAX_PRESENCE_WINDOW)
            .min(MAX_PRESENCE_WINDOW)
    }

    pub fn is_in_memory_db(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
