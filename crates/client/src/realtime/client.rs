//! Composition root for the real-time layer.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use servicedesk_shared::{ChannelKey, RealtimeError, ServerEvent};

use crate::config::RealtimeConfig;

use super::connection::{Connection, ConnectionState, ControlLink};
use super::coordinator::ReconnectionCoordinator;
use super::filter;
use super::registry::{ChannelRegistry, ScopeFilter};
use super::subscription::Subscription;

/// The process-wide real-time client: one connection, one registry, one
/// reconnection coordinator, created together and torn down together.
///
/// There is exactly one instance per application session; consumers receive
/// it by injection and interact only through [`RealtimeClient::subscribe`],
/// never with the transport directly.
pub struct RealtimeClient {
    connection: Arc<Connection>,
    registry: Arc<ChannelRegistry>,
    coordinator: JoinHandle<()>,
}

impl RealtimeClient {
    /// Validate the endpoint and bring the layer up. Configuration problems
    /// are the only error surfaced here; transport failures after this point
    /// are absorbed into the connection state.
    pub fn connect(endpoint: &str) -> Result<Self, RealtimeError> {
        Self::with_config(RealtimeConfig::new(endpoint)?)
    }

    pub fn with_config(config: RealtimeConfig) -> Result<Self, RealtimeError> {
        let connection = Connection::connect(&config);

        let link: Arc<dyn ControlLink> = connection.clone();
        let registry = ChannelRegistry::new(link);

        // The registry is the single raw listener; it validates, routes, and
        // fans out to subscribers.
        let registry_for_events = registry.clone();
        connection.on_event(move |envelope| {
            let event = envelope.payload;
            if let Err(e) = filter::validate(&event) {
                tracing::warn!(error = %e, "dropping malformed event");
                return;
            }
            let channel = filter::channel_for_event(&event);
            registry_for_events.dispatch(&channel, &event);
        });

        let coordinator =
            ReconnectionCoordinator::new(registry.clone()).spawn(connection.watch_state());

        Ok(Self {
            connection,
            registry,
            coordinator,
        })
    }

    /// Register a consumer callback for one channel. The returned handle
    /// unsubscribes on drop; UI components hold it for their mounted
    /// lifetime.
    pub fn subscribe(
        &self,
        channel: ChannelKey,
        filter: ScopeFilter,
        callback: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.registry.subscribe(channel, filter, Arc::new(callback))
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// State feed for UI affordances ("live updates paused" and the like).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Tear the layer down. Consumers' subscriptions become inert; their
    /// handles remain safe to drop afterwards.
    pub fn disconnect(&self) {
        self.connection.disconnect();
        self.coordinator.abort();
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
