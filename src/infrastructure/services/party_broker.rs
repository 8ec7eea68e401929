use std::collections::{HashMap, HashSet};

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::domain::value_objects::PartyEvent;

/// One broadcast channel per party
struct PartyChannel {
    sender: Sender<PartyEvent>,
    // Keeps the channel open while nobody is subscribed
    _keepalive: InactiveReceiver<PartyEvent>,
}

#[derive(Default)]
struct Channels {
    open: HashMap<String, PartyChannel>,
    /// Ended parties never get a channel again
    ended: HashSet<String>,
}

/// Per-party publish/subscribe
pub struct PartyBroker {
    capacity: usize,
    channels: RwLock<Channels>,
}

impl PartyBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(Channels::default()),
        }
    }

    /// Subscribe to a party's events, opening its channel if needed.
    ///
    /// Subscribing to an ended party yields a receiver that is already closed.
    pub fn subscribe(&self, party_id: &str) -> Receiver<PartyEvent> {
        if let Some(channel) = self.channels.read().open.get(party_id) {
            return channel.sender.new_receiver();
        }

        let mut channels = self.channels.write();
        if channels.ended.contains(party_id) {
            let (sender, receiver) = broadcast(1);
            sender.close();
            return receiver;
        }
        let channel = channels.open.entry(party_id.to_string()).or_insert_with(|| {
            let (mut sender, receiver) = broadcast(self.capacity);
            // Slow subscribers lose the oldest events rather than block publishers
            sender.set_overflow(true);
            PartyChannel {
                sender,
                _keepalive: receiver.deactivate(),
            }
        });
        channel.sender.new_receiver()
    }

    /// Publish an event to its party's subscribers.
    ///
    /// Returns the number of active receivers the event was queued for.
    pub fn publish(&self, event: PartyEvent) -> usize {
        let channels = self.channels.read();
        let Some(channel) = channels.open.get(event.party_id()) else {
            tracing::trace!("No channel for party {}, dropping event", event.party_id());
            return 0;
        };

        let receiver_count = channel.sender.receiver_count();
        tracing::debug!(
            "Broadcasting '{}' for party {} to {} receivers",
            event.event_name(),
            event.party_id(),
            receiver_count
        );
        match channel.sender.try_broadcast(event) {
            Ok(None) => receiver_count,
            Ok(Some(_)) => {
                tracing::debug!("Event broadcast with overflow");
                receiver_count
            }
            Err(TrySendError::Inactive(_)) => 0,
            Err(e) => {
                tracing::warn!("Failed to broadcast event: {:?}", e);
                0
            }
        }
    }

    /// Close an ended party's channel for good. Subscribers drain queued
    /// events, then end.
    pub fn close(&self, party_id: &str) {
        let mut channels = self.channels.write();
        channels.ended.insert(party_id.to_string());
        if let Some(channel) = channels.open.remove(party_id) {
            channel.sender.close();
            tracing::debug!("Closed event channel for party {}", party_id);
        }
    }

    /// Drop an idle party's channel. A later subscribe opens a fresh one.
    pub fn release(&self, party_id: &str) {
        if let Some(channel) = self.channels.write().open.remove(party_id) {
            channel.sender.close();
            tracing::debug!("Released event channel for party {}", party_id);
        }
    }

    pub fn subscriber_count(&self, party_id: &str) -> usize {
        self.channels
            .read()
            .open
            .get(party_id)
            .map(|c| c.sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().open.len()
    }
}
