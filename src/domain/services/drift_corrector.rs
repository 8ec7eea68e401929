//! Guest-side drift correction
//!
//! Reconciles a guest's local player against the host's authoritative
//! snapshot. Small drift is tolerated; only drift beyond the threshold
//! causes a hard seek.

use crate::domain::value_objects::PlaybackState;

/// Maximum drift (seconds) tolerated before hard-seeking
pub const DRIFT_THRESHOLD_SECS: f64 = 1.5;

/// Local player controls the corrector needs
pub trait VideoPlayer {
    /// Current local position in seconds
    fn position(&self) -> f64;
    fn is_playing(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
}

/// What the corrector did to the player
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Correction {
    /// Absolute drift measured before correcting
    pub drift: f64,
    pub seeked_to: Option<f64>,
    pub started: bool,
    pub paused: bool,
}

impl Correction {
    pub fn is_noop(&self) -> bool {
        self.seeked_to.is_none() && !self.started && !self.paused
    }
}

/// Threshold-based reconciliation against authoritative state
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    threshold: f64,
    /// Set once the first snapshot has been applied
    initial_sync_done: bool,
}

impl DriftCorrector {
    pub fn new() -> Self {
        Self::with_threshold(DRIFT_THRESHOLD_SECS)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            initial_sync_done: false,
        }
    }

    /// Whether the given local position must be hard-seeked
    pub fn needs_seek(&self, local_position: f64, authoritative_position: f64) -> bool {
        (local_position - authoritative_position).abs() > self.threshold
    }

    /// Apply an authoritative snapshot to the local player.
    ///
    /// The first snapshot always seeks, since there is no local position
    /// worth preserving yet.
    pub fn reconcile<P: VideoPlayer + ?Sized>(
        &mut self,
        player: &mut P,
        state: &PlaybackState,
    ) -> Correction {
        let local = player.position();
        let drift = (local - state.position).abs();
        let mut correction = Correction {
            drift,
            ..Default::default()
        };

        if !self.initial_sync_done || drift > self.threshold {
            tracing::debug!(
                "Drift {:.3}s (local: {:.3}s, host: {:.3}s), seeking",
                drift,
                local,
                state.position
            );
            player.seek(state.position);
            correction.seeked_to = Some(state.position);
            self.initial_sync_done = true;
        }

        if state.is_playing && !player.is_playing() {
            player.play();
            correction.started = true;
        } else if !state.is_playing && player.is_playing() {
            player.pause();
            correction.paused = true;
        }

        correction
    }

    /// Forget the initial sync, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.initial_sync_done = false;
    }
}

impl Default for DriftCorrector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory player recording seeks
    #[derive(Debug, Default)]
    pub(crate) struct FakePlayer {
        pub position: f64,
        pub playing: bool,
        pub seeks: Vec<f64>,
    }

    impl VideoPlayer for FakePlayer {
        fn position(&self) -> f64 {
            self.position
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn play(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn seek(&mut self, position: f64) {
            self.position = position;
            self.seeks.push(position);
        }
    }

    fn synced_corrector(player: &mut FakePlayer) -> DriftCorrector {
        let mut corrector = DriftCorrector::new();
        corrector.reconcile(player, &PlaybackState::new(player.position, false, 1));
        player.seeks.clear();
        corrector
    }

    #[test]
    fn test_initial_snapshot_always_seeks() {
        let mut player = FakePlayer::default();
        let mut corrector = DriftCorrector::new();

        let correction = corrector.reconcile(&mut player, &PlaybackState::new(0.4, true, 1));

        assert_eq!(correction.seeked_to, Some(0.4));
        assert!(correction.started);
        assert_eq!(player.seeks, vec![0.4]);
        assert!(player.playing);
    }

    #[test]
    fn test_seeks_only_beyond_threshold() {
        let cases = [
            (10.0, 10.0, false),
            (10.0, 11.5, false),
            (11.5, 10.0, false),
            (10.0, 11.51, true),
            (12.0, 10.0, true),
            (0.0, 42.3, true),
        ];
        for (local, authoritative, expect_seek) in cases {
            let mut player = FakePlayer {
                position: local,
                ..Default::default()
            };
            let mut corrector = synced_corrector(&mut player);
            let correction =
                corrector.reconcile(&mut player, &PlaybackState::new(authoritative, false, 2));
            assert_eq!(
                correction.seeked_to.is_some(),
                expect_seek,
                "local {local} vs authoritative {authoritative}"
            );
            assert_eq!(corrector.needs_seek(local, authoritative), expect_seek);
            if !expect_seek {
                assert_eq!(player.position, local);
            }
        }
    }

    #[test]
    fn test_play_pause_follow_host() {
        let mut player = FakePlayer::default();
        let mut corrector = synced_corrector(&mut player);

        let correction = corrector.reconcile(&mut player, &PlaybackState::new(0.0, true, 2));
        assert!(correction.started);
        assert!(correction.seeked_to.is_none());
        assert!(player.playing);

        let correction = corrector.reconcile(&mut player, &PlaybackState::new(0.2, true, 3));
        assert!(correction.is_noop());

        let correction = corrector.reconcile(&mut player, &PlaybackState::new(0.3, false, 4));
        assert!(correction.paused);
        assert!(!player.playing);
    }

    #[test]
    fn test_reset_forces_seek_again() {
        let mut player = FakePlayer {
            position: 5.0,
            ..Default::default()
        };
        let mut corrector = synced_corrector(&mut player);
        corrector.reset();
        let correction = corrector.reconcile(&mut player, &PlaybackState::new(5.2, false, 2));
        assert_eq!(correction.seeked_to, Some(5.2));
    }
}
