use serde::{Deserialize, Serialize};

/// Authoritative playback snapshot for a party.
///
/// Only the host may produce these; everyone else gets immutable copies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Position in seconds
    pub position: f64,
    pub is_playing: bool,
    /// Unix millis, strictly increasing per party
    pub updated_at: i64,
}

impl PlaybackState {
    pub fn new(position: f64, is_playing: bool, updated_at: i64) -> Self {
        Self {
            position,
            is_playing,
            updated_at,
        }
    }

    /// Whether `self` supersedes a snapshot stamped `previous_updated_at`
    pub fn is_newer_than(&self, previous_updated_at: i64) -> bool {
        self.updated_at > previous_updated_at
    }
}

/// Reject positions that are not finite or are negative
pub fn validate_position(position: f64) -> Result<f64, &'static str> {
    if !position.is_finite() {
        return Err("Position must be a finite number");
    }
    if position < 0.0 {
        return Err("Position must not be negative");
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_position() {
        assert_eq!(validate_position(0.0), Ok(0.0));
        assert_eq!(validate_position(42.3), Ok(42.3));
        assert!(validate_position(-0.5).is_err());
        assert!(validate_position(f64::NAN).is_err());
        assert!(validate_position(f64::INFINITY).is_err());
    }

    #[test]
    fn test_is_newer_than() {
        let state = PlaybackState::new(1.0, true, 100);
        assert!(state.is_newer_than(99));
        assert!(!state.is_newer_than(100));
        assert!(!state.is_newer_than(101));
    }
}
