use serde::{Deserialize, Serialize};

use crate::domain::value_objects::PlaybackState;

/// Characters used in join codes (no 0/O, 1/I/L)
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Join code length
pub const JOIN_CODE_LENGTH: usize = 6;

/// Party status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Ended,
}

impl PartyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyStatus::Active => "active",
            PartyStatus::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PartyStatus::Active),
            "ended" => Some(PartyStatus::Ended),
            _ => None,
        }
    }
}

/// Party entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: String,
    pub code: String,
    pub host_id: String,
    pub video_ref: String,
    pub status: PartyStatus,
    pub playback_position: f64,
    pub is_playing: bool,
    /// Unix millis of the last committed playback write
    pub playback_updated_at: i64,
    pub created_at: i64,
    pub ended_at: Option<i64>,
}

impl Party {
    /// Create a new active party, paused at zero
    pub fn new(id: String, code: String, host_id: String, video_ref: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id,
            code,
            host_id,
            video_ref,
            status: PartyStatus::Active,
            playback_position: 0.0,
            is_playing: false,
            playback_updated_at: now,
            created_at: now,
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PartyStatus::Active
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    /// Authoritative playback snapshot
    pub fn playback(&self) -> PlaybackState {
        PlaybackState {
            position: self.playback_position,
            is_playing: self.is_playing,
            updated_at: self.playback_updated_at,
        }
    }

    /// Mark the party as ended. Returns false if it already was.
    pub fn end(&mut self) -> bool {
        if self.status == PartyStatus::Ended {
            return false;
        }
        self.status = PartyStatus::Ended;
        self.is_playing = false;
        self.ended_at = Some(chrono::Utc::now().timestamp_millis());
        true
    }
}

/// Generate a random join code
pub fn generate_join_code() -> String {
    generate_join_code_with(&mut rand::thread_rng())
}

/// Generate a join code from the given RNG
pub fn generate_join_code_with<R: rand::Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Normalize user-typed join code input.
///
/// Strips whitespace and separators and uppercases. Returns `None` if the
/// result cannot be a join code.
pub fn normalize_join_code(input: &str) -> Option<String> {
    let normalized: String = input
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.len() != JOIN_CODE_LENGTH {
        return None;
    }

    if normalized.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)) {
        Some(normalized)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generated_codes_use_alphabet() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate_join_code_with(&mut rng);
            assert_eq!(code.len(), JOIN_CODE_LENGTH);
            assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)), "bad code {code}");
        }
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'I', b'L'] {
            assert!(!JOIN_CODE_ALPHABET.contains(&c));
        }
        assert_eq!(JOIN_CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_normalize_join_code() {
        assert_eq!(normalize_join_code("abc234").as_deref(), Some("ABC234"));
        assert_eq!(normalize_join_code(" ABC-234 ").as_deref(), Some("ABC234"));
        assert_eq!(normalize_join_code("ABC23"), None);
        assert_eq!(normalize_join_code("ABC2345"), None);
        // O and 0 are not in the alphabet
        assert_eq!(normalize_join_code("ABC0O4"), None);
    }

    #[test]
    fn test_new_party_is_paused_at_zero() {
        let party = Party::new("p1".into(), "ABC234".into(), "host".into(), "video".into());
        assert!(party.is_active());
        assert!(party.is_host("host"));
        assert!(!party.is_host("guest"));
        let playback = party.playback();
        assert_eq!(playback.position, 0.0);
        assert!(!playback.is_playing);
        assert!(party.ended_at.is_none());
    }

    #[test]
    fn test_end_is_terminal() {
        let mut party = Party::new("p1".into(), "ABC234".into(), "host".into(), "video".into());
        party.is_playing = true;
        assert!(party.end());
        assert_eq!(party.status, PartyStatus::Ended);
        assert!(!party.is_playing);
        assert!(party.ended_at.is_some());
        assert!(!party.end());
    }
}
