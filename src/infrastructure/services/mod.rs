mod heartbeat;
mod party_broker;
mod playback_replicator;
mod presence_tracker;

pub use heartbeat::Heartbeat;
pub use party_broker::PartyBroker;
pub use playback_replicator::{PlaybackError, PlaybackReplicator, UpdateOutcome};
pub use presence_tracker::{PingOutcome, PresenceError, PresenceTracker};
