use serde::{Deserialize, Serialize};

/// Derived participant presence. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Present and heartbeating within the liveness window
    Joined,
    /// Present in the join ledger but no recent heartbeat
    Stale,
    /// Soft-closed by leave or reaper
    Left,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Joined => "joined",
            Presence::Stale => "stale",
            Presence::Left => "left",
        }
    }
}

/// Participant entity - one row per (party, user), reused on rejoin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: i64,
    pub party_id: String,
    pub user_id: String,
    pub joined_at: i64,
    pub left_at: Option<i64>,
    pub last_ping_at: i64,
}

impl Participant {
    pub fn new(party_id: String, user_id: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: 0, // Set by database
            party_id,
            user_id,
            joined_at: now,
            left_at: None,
            last_ping_at: now,
        }
    }

    /// Row has not been soft-closed
    pub fn is_present(&self) -> bool {
        self.left_at.is_none()
    }

    /// Presence at `now_ms` given a liveness window in millis
    pub fn presence(&self, now_ms: i64, liveness_window_ms: i64) -> Presence {
        if self.left_at.is_some() {
            Presence::Left
        } else if now_ms - self.last_ping_at < liveness_window_ms {
            Presence::Joined
        } else {
            Presence::Stale
        }
    }
}
