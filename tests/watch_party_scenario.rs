//! End-to-end watch party: host drives playback, a guest follows it
//! through the party channel, and the session ends cleanly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_broadcast::Receiver;

use watch_party::application::party::{
    CreateParty, CreatePartyInput, EndParty, EndPartyInput, JoinParty, JoinPartyInput, LeaveParty,
    LeavePartyInput,
};
use watch_party::domain::services::{GuestSync, SyncOutcome, VideoPlayer};
use watch_party::domain::value_objects::{ParticipantAction, PartyEvent};
use watch_party::infrastructure::database::repositories::InMemoryPartyRepository;
use watch_party::infrastructure::services::{
    Heartbeat, PartyBroker, PlaybackReplicator, PresenceTracker, UpdateOutcome,
};

const THROTTLE: Duration = Duration::from_millis(1000);

/// Local player that only moves when told to
#[derive(Default)]
struct TestPlayer {
    position: f64,
    playing: bool,
    seeks: Vec<f64>,
}

impl TestPlayer {
    /// Simulate local playback progress
    fn advance(&mut self, secs: f64) {
        if self.playing {
            self.position += secs;
        }
    }
}

impl VideoPlayer for TestPlayer {
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

struct Backend {
    repo: Arc<InMemoryPartyRepository>,
    broker: Arc<PartyBroker>,
    replicator: Arc<PlaybackReplicator<InMemoryPartyRepository>>,
    presence: Arc<PresenceTracker<InMemoryPartyRepository>>,
}

impl Backend {
    fn new() -> Self {
        let repo = Arc::new(InMemoryPartyRepository::new());
        let broker = Arc::new(PartyBroker::new(64));
        let replicator = Arc::new(PlaybackReplicator::new(repo.clone(), broker.clone(), THROTTLE));
        let presence = Arc::new(PresenceTracker::new(
            repo.clone(),
            broker.clone(),
            replicator.clone(),
            Duration::from_secs(90),
            Duration::from_secs(600),
        ));
        Self {
            repo,
            broker,
            replicator,
            presence,
        }
    }
}

/// Feed the guest every queued event, returning the outcomes
fn drain(
    rx: &mut Receiver<PartyEvent>,
    sync: &mut GuestSync,
    player: &mut TestPlayer,
) -> Vec<SyncOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(event) = rx.try_recv() {
        outcomes.push(sync.handle(player, &event));
    }
    outcomes
}

#[tokio::test(start_paused = true)]
async fn test_guest_follows_host_until_party_ends() {
    let backend = Backend::new();

    // Host creates the party
    let created = CreateParty::new(backend.repo.clone())
        .execute(CreatePartyInput {
            host_id: "host".into(),
            video_ref: "V".into(),
        })
        .await
        .unwrap();
    let party_id = created.party.id.clone();
    let code = created.party.code.clone();

    // Guest subscribes, then joins by code
    let mut rx = backend.broker.subscribe(&party_id);
    let joined = JoinParty::new(backend.repo.clone(), backend.broker.clone())
        .execute(JoinPartyInput {
            user_id: "guest".into(),
            code,
        })
        .await
        .unwrap();
    assert!(!joined.playback.is_playing);
    assert_eq!(joined.playback.position, 0.0);

    let mut player = TestPlayer::default();
    let mut sync = GuestSync::new(party_id.clone());
    sync.join(&mut player, &joined.playback);
    assert!(!player.playing);

    // Own join notification
    assert_eq!(
        drain(&mut rx, &mut sync, &mut player),
        vec![SyncOutcome::ParticipantsChanged]
    );
    player.seeks.clear();

    // Host presses play at 0: guest starts without seeking
    let outcome = backend
        .replicator
        .update(&party_id, "host", 0.0, true)
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Committed(_)));
    let outcomes = drain(&mut rx, &mut sync, &mut player);
    match outcomes.as_slice() {
        [SyncOutcome::Corrected(correction)] => {
            assert!(correction.started);
            assert_eq!(correction.seeked_to, None);
        }
        other => panic!("unexpected outcomes {other:?}"),
    }
    assert!(player.playing);
    assert!(player.seeks.is_empty());

    // Guest drifts a little; a throttled tick inside tolerance leaves it alone
    player.advance(5.0);
    tokio::time::sleep(THROTTLE).await;
    backend
        .replicator
        .update(&party_id, "host", 6.0, true)
        .await
        .unwrap();
    drain(&mut rx, &mut sync, &mut player);
    assert!(player.seeks.is_empty());
    assert_eq!(player.position, 5.0);

    // Host seeks: guest hard-seeks regardless of where it is
    player.advance(3.0);
    backend
        .replicator
        .sync_all(&party_id, "host", 42.3, true)
        .await
        .unwrap();
    drain(&mut rx, &mut sync, &mut player);
    assert_eq!(player.seeks, vec![42.3]);
    assert_eq!(player.position, 42.3);
    assert!(player.playing);

    // Host ends the party: guest exits
    EndParty::new(
        backend.repo.clone(),
        backend.replicator.clone(),
        backend.broker.clone(),
    )
    .execute(EndPartyInput {
        user_id: "host".into(),
        party_id: party_id.clone(),
    })
    .await
    .unwrap();

    let outcomes = drain(&mut rx, &mut sync, &mut player);
    assert_eq!(outcomes.last(), Some(&SyncOutcome::Exit));
    assert!(sync.has_exited());
    assert!(!player.playing);

    // Channel is closed and no slot remains
    assert!(rx.recv().await.is_err());
    assert_eq!(backend.broker.channel_count(), 0);
    assert_eq!(backend.replicator.active_slots(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_stops_on_leave() {
    let backend = Backend::new();
    let created = CreateParty::new(backend.repo.clone())
        .execute(CreatePartyInput {
            host_id: "host".into(),
            video_ref: "V".into(),
        })
        .await
        .unwrap();
    let party_id = created.party.id.clone();
    JoinParty::new(backend.repo.clone(), backend.broker.clone())
        .execute(JoinPartyInput {
            user_id: "guest".into(),
            code: created.party.code.clone(),
        })
        .await
        .unwrap();

    let pings = Arc::new(AtomicUsize::new(0));
    let heartbeat = {
        let presence = backend.presence.clone();
        let party_id = party_id.clone();
        let pings = pings.clone();
        Heartbeat::spawn(Duration::from_secs(30), move || {
            let presence = presence.clone();
            let party_id = party_id.clone();
            let pings = pings.clone();
            async move {
                presence.ping(&party_id, "guest").await?;
                pings.fetch_add(1, Ordering::SeqCst);
                Ok::<(), watch_party::infrastructure::services::PresenceError>(())
            }
        })
    };

    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(pings.load(Ordering::SeqCst), 2);

    // Graceful exit: cancel the timer, then leave
    heartbeat.stop();
    let left = LeaveParty::new(
        backend.repo.clone(),
        backend.replicator.clone(),
        backend.broker.clone(),
    )
    .execute(LeavePartyInput {
        user_id: "guest".into(),
        party_id: party_id.clone(),
    })
    .await
    .unwrap();
    assert!(left.left);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(pings.load(Ordering::SeqCst), 2);

    let mut rx = backend.broker.subscribe(&party_id);
    JoinParty::new(backend.repo.clone(), backend.broker.clone())
        .execute(JoinPartyInput {
            user_id: "guest".into(),
            code: created.party.code.clone(),
        })
        .await
        .unwrap();
    assert!(matches!(
        rx.try_recv().unwrap(),
        PartyEvent::ParticipantsChanged {
            action: ParticipantAction::Rejoined,
            ..
        }
    ));
}
