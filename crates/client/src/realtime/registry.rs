//! Channel registry: reference-counted join/leave and per-channel fan-out.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use servicedesk_shared::{ChannelKey, ClientCommand, ServerEvent};
use uuid::Uuid;

use super::connection::ControlLink;
use super::subscription::Subscription;

/// Consumer callback invoked with each event that passes the scope filter.
pub type EventCallback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Predicate restricting which events within a channel reach a subscriber.
pub type ScopeFilter = Arc<dyn Fn(&ServerEvent) -> bool + Send + Sync>;

struct SubscriberSlot {
    id: Uuid,
    alive: Arc<AtomicBool>,
    filter: ScopeFilter,
    callback: EventCallback,
}

#[derive(Default)]
struct ChannelEntry {
    /// Delivery order is subscription order.
    subscribers: Vec<SubscriberSlot>,
    /// Whether a join for this channel has been issued on the current link
    /// session. Cleared when the link drops, restored by the replay.
    joined_on_server: bool,
}

/// Maps each channel key to its current subscribers and server join state.
///
/// An entry exists exactly while the channel has at least one live
/// subscriber: the first subscriber joins the server-side room, the last one
/// out leaves it and deletes the entry.
pub struct ChannelRegistry {
    link: Arc<dyn ControlLink>,
    channels: Mutex<HashMap<ChannelKey, ChannelEntry>>,
}

impl ChannelRegistry {
    pub fn new(link: Arc<dyn ControlLink>) -> Arc<Self> {
        Arc::new(Self {
            link,
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Register interest in a channel. The first subscriber triggers a join
    /// message; `joined_on_server` is set optimistically since the server
    /// treats duplicate joins as idempotent.
    pub fn subscribe(
        self: &Arc<Self>,
        channel: ChannelKey,
        filter: ScopeFilter,
        callback: EventCallback,
    ) -> Subscription {
        let id = Uuid::new_v4();
        let alive = Arc::new(AtomicBool::new(true));
        let slot = SubscriberSlot {
            id,
            alive: alive.clone(),
            filter,
            callback,
        };

        let first = {
            let mut channels = self.lock();
            let entry = channels.entry(channel.clone()).or_default();
            let first = entry.subscribers.is_empty();
            entry.subscribers.push(slot);
            if first {
                entry.joined_on_server = true;
            }
            first
        };
        if first {
            tracing::debug!(%channel, "first subscriber, joining channel");
            self.link.send(ClientCommand::JoinChannel {
                channel: channel.clone(),
            });
        }

        Subscription {
            id,
            channel,
            alive,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove one subscriber; called by [`Subscription::unsubscribe`]. Sends
    /// a leave and drops the entry when the last subscriber detaches.
    pub(crate) fn detach(&self, channel: &ChannelKey, id: Uuid) {
        let last = {
            let mut channels = self.lock();
            match channels.get_mut(channel) {
                Some(entry) => {
                    entry.subscribers.retain(|slot| slot.id != id);
                    if entry.subscribers.is_empty() {
                        channels.remove(channel);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };
        if last {
            tracing::debug!(%channel, "last subscriber gone, leaving channel");
            self.link.send(ClientCommand::LeaveChannel {
                channel: channel.clone(),
            });
        }
    }

    /// Deliver an event to every live subscriber of `channel` whose scope
    /// filter accepts it, in subscription order.
    ///
    /// The subscriber set is snapshotted before iterating, so callbacks may
    /// subscribe or unsubscribe freely; liveness is re-checked per delivery
    /// so an unsubscribe taking effect mid-pass still suppresses delivery. A
    /// panicking callback is logged and does not stop the pass. No
    /// deduplication happens here: at-least-once delivery from the transport
    /// is passed through, and idempotent handling is the consumer's job.
    pub fn dispatch(&self, channel: &ChannelKey, event: &ServerEvent) {
        let snapshot: Vec<(Arc<AtomicBool>, ScopeFilter, EventCallback)> = {
            let channels = self.lock();
            match channels.get(channel) {
                Some(entry) => entry
                    .subscribers
                    .iter()
                    .map(|slot| (slot.alive.clone(), slot.filter.clone(), slot.callback.clone()))
                    .collect(),
                None => return,
            }
        };

        for (alive, filter, callback) in snapshot {
            if !alive.load(Ordering::SeqCst) {
                continue;
            }
            if !filter(event) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!(%channel, topic = event.topic(), "subscriber callback panicked");
            }
        }
    }

    /// Channels that currently have at least one subscriber.
    pub fn active_channels(&self) -> Vec<ChannelKey> {
        self.lock().keys().cloned().collect()
    }

    /// Whether a join has been issued for `channel` on the current link session.
    pub fn is_joined(&self, channel: &ChannelKey) -> bool {
        self.lock()
            .get(channel)
            .map(|entry| entry.joined_on_server)
            .unwrap_or(false)
    }

    /// Forget server-side joins; room membership did not survive the link.
    pub(crate) fn mark_unjoined(&self) {
        for entry in self.lock().values_mut() {
            entry.joined_on_server = false;
        }
    }

    /// Re-issue a join for every registered channel, regardless of its join
    /// flag: called after a reconnect, when server-side membership is gone.
    pub fn replay_joins(&self) {
        let channels: Vec<ChannelKey> = {
            let mut guard = self.lock();
            guard
                .iter_mut()
                .map(|(channel, entry)| {
                    entry.joined_on_server = true;
                    channel.clone()
                })
                .collect()
        };
        for channel in channels {
            tracing::debug!(%channel, "replaying channel join");
            self.link.send(ClientCommand::JoinChannel { channel });
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChannelKey, ChannelEntry>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
