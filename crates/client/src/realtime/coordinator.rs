//! Restores server-side room membership after a reconnect.

use std::sync::Arc;

use tokio::sync::watch;

use super::connection::ConnectionState;
use super::registry::ChannelRegistry;

/// Watches the connection state machine
/// (`Disconnected -> Connecting -> Connected -> Reconnecting -> Connected`)
/// and replays a join for every registered channel each time the link comes
/// back, since server-side membership does not survive a transport-level
/// reconnect. Replays are edge-triggered on entering `Connected`, so a
/// reconnect cycle produces exactly one replay no matter how many retry
/// attempts it took.
pub struct ReconnectionCoordinator {
    registry: Arc<ChannelRegistry>,
}

impl ReconnectionCoordinator {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// React to one state transition. Split out from the watch loop so the
    /// state machine can be driven directly in tests.
    pub fn on_transition(&self, prev: &ConnectionState, next: &ConnectionState) {
        if next.is_connected() && !prev.is_connected() {
            tracing::info!("link restored, replaying channel joins");
            self.registry.replay_joins();
        } else if prev.is_connected() && !next.is_connected() {
            self.registry.mark_unjoined();
        }
    }

    /// Drive the coordinator from a state feed until the feed closes.
    pub fn spawn(self, mut states: watch::Receiver<ConnectionState>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut prev = states.borrow().clone();
            while states.changed().await.is_ok() {
                let next = states.borrow_and_update().clone();
                self.on_transition(&prev, &next);
                prev = next;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use servicedesk_shared::{ChannelKey, ServerEvent};

    use super::*;
    use crate::realtime::scope;
    use crate::test_support::FakeLink;

    fn noop() -> crate::realtime::EventCallback {
        Arc::new(|_: &ServerEvent| {})
    }

    #[test]
    fn replays_join_once_per_reconnect() {
        let link = FakeLink::connected();
        let registry = ChannelRegistry::new(link.clone());
        let coordinator = ReconnectionCoordinator::new(registry.clone());
        let channel = ChannelKey::requests_global();

        let _sub = registry.subscribe(channel.clone(), scope::any(), noop());
        assert_eq!(link.join_count(&channel), 1);

        // Transport drops; joins sent while reconnecting go nowhere.
        link.set_state(ConnectionState::Reconnecting { attempt: 1 });
        coordinator.on_transition(
            &ConnectionState::Connected,
            &ConnectionState::Reconnecting { attempt: 1 },
        );
        assert!(!registry.is_joined(&channel));

        // A second retry attempt before the reconnect completes must not
        // trigger anything.
        coordinator.on_transition(
            &ConnectionState::Reconnecting { attempt: 1 },
            &ConnectionState::Reconnecting { attempt: 2 },
        );
        assert_eq!(link.join_count(&channel), 1);

        // Reconnect completes: exactly one replayed join.
        link.set_state(ConnectionState::Connected);
        coordinator.on_transition(
            &ConnectionState::Reconnecting { attempt: 2 },
            &ConnectionState::Connected,
        );
        assert_eq!(link.join_count(&channel), 2);
        assert!(registry.is_joined(&channel));
    }

    #[test]
    fn replays_cover_every_registered_channel() {
        let link = FakeLink::connected();
        let registry = ChannelRegistry::new(link.clone());
        let coordinator = ReconnectionCoordinator::new(registry.clone());

        let chat = ChannelKey::chat(42);
        let feed = ChannelKey::requests_global();
        let _a = registry.subscribe(chat.clone(), scope::any(), noop());
        let _b = registry.subscribe(feed.clone(), scope::any(), noop());

        link.set_state(ConnectionState::Reconnecting { attempt: 1 });
        link.set_state(ConnectionState::Connected);
        coordinator.on_transition(
            &ConnectionState::Reconnecting { attempt: 1 },
            &ConnectionState::Connected,
        );

        assert_eq!(link.join_count(&chat), 2);
        assert_eq!(link.join_count(&feed), 2);
    }

    #[test]
    fn unsubscribed_channels_are_not_replayed() {
        let link = FakeLink::connected();
        let registry = ChannelRegistry::new(link.clone());
        let coordinator = ReconnectionCoordinator::new(registry.clone());
        let channel = ChannelKey::chat(9);

        let sub = registry.subscribe(channel.clone(), scope::any(), noop());
        sub.unsubscribe();

        coordinator.on_transition(
            &ConnectionState::Reconnecting { attempt: 1 },
            &ConnectionState::Connected,
        );
        assert_eq!(link.join_count(&channel), 1);
    }

    #[tokio::test]
    async fn watch_loop_reacts_to_state_edges() {
        let link = FakeLink::connected();
        let registry = ChannelRegistry::new(link.clone());
        let channel = ChannelKey::requests_global();
        let _sub = registry.subscribe(channel.clone(), scope::any(), noop());

        use crate::realtime::ControlLink;
        let handle = ReconnectionCoordinator::new(registry.clone()).spawn(link.watch_state());

        link.set_state(ConnectionState::Reconnecting { attempt: 1 });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        link.set_state(ConnectionState::Connected);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(link.join_count(&channel), 2);
        handle.abort();
    }
}
