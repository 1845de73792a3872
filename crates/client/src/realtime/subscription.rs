//! One consumer's registration for one channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use servicedesk_shared::ChannelKey;
use uuid::Uuid;

use super::registry::ChannelRegistry;

/// Handle for one consumer's interest in one channel.
///
/// Owned exclusively by the consumer that created it. The callback runs zero
/// or more times between creation and unsubscribe, never after. Dropping the
/// handle unsubscribes, so holding it for the lifetime of a UI component
/// gives scoped acquisition with guaranteed release. A dead handle cannot be
/// revived; re-subscribing creates a new one.
pub struct Subscription {
    pub(crate) id: Uuid,
    pub(crate) channel: ChannelKey,
    pub(crate) alive: Arc<AtomicBool>,
    pub(crate) registry: Weak<ChannelRegistry>,
}

impl Subscription {
    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop delivery immediately. Idempotent: the second and later calls do
    /// nothing, and in particular send no duplicate leave message.
    pub fn unsubscribe(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            if let Some(registry) = self.registry.upgrade() {
                registry.detach(&self.channel, self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
