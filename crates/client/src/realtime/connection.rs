//! WebSocket connection with state management and auto-reconnect.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use servicedesk_shared::{ClientCommand, ServerEvent, WsEnvelope};

use crate::config::RealtimeConfig;

/// Connection state of the single physical WebSocket.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = unbounded).
    pub max_attempts: u32,
    /// Initial delay in milliseconds.
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds.
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Capped exponential delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }
}

/// The capability the registry and coordinator need from the transport.
///
/// Injected rather than looked up globally so tests can substitute a
/// recording fake.
pub trait ControlLink: Send + Sync {
    /// Best-effort send. A no-op unless the link is currently connected;
    /// join commands dropped here are replayed by the reconnection
    /// coordinator once the link is back.
    fn send(&self, cmd: ClientCommand);

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// A live feed of state transitions.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;
}

type RawEventHandler = Arc<dyn Fn(WsEnvelope<ServerEvent>) + Send + Sync>;
type Listeners = Arc<RwLock<Vec<RawEventHandler>>>;

/// A managed WebSocket connection to the servicedesk endpoint.
///
/// Owns the socket lifecycle: connect, reconnect with capped exponential
/// backoff, and teardown. Transport errors never escape this type; they are
/// absorbed into [`ConnectionState`].
pub struct Connection {
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cmd_tx: UnboundedSender<WsEnvelope<ClientCommand>>,
    listeners: Listeners,
    shutdown_tx: watch::Sender<bool>,
}

impl Connection {
    /// Establish the connection in a background task. Must be called from
    /// within a tokio runtime. Connection failures are not raised to the
    /// caller; they feed the retry loop.
    pub fn connect(config: &RealtimeConfig) -> Arc<Self> {
        let state_tx = Arc::new(watch::channel(ConnectionState::Disconnected).0);
        let (cmd_tx, cmd_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listeners: Listeners = Arc::new(RwLock::new(Vec::new()));

        tokio::spawn(run_loop(
            config.endpoint.clone(),
            config.reconnect.clone(),
            state_tx.clone(),
            cmd_rx,
            listeners.clone(),
            shutdown_rx,
        ));

        Arc::new(Self {
            state_tx,
            cmd_tx,
            listeners,
            shutdown_tx,
        })
    }

    /// Register a raw listener for inbound events. Multiple listeners are
    /// allowed; the channel registry registers exactly one and fans out
    /// internally.
    pub fn on_event(&self, handler: impl Fn(WsEnvelope<ServerEvent>) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Tear down the connection: stop the retry loop, release the socket,
    /// and unregister all raw listeners. Safe to call more than once.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        self.state_tx.send_replace(ConnectionState::Disconnected);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl ControlLink for Connection {
    fn send(&self, cmd: ClientCommand) {
        if !self.state_tx.borrow().is_connected() {
            tracing::debug!(?cmd, "link not connected, dropping command");
            return;
        }
        let _ = self.cmd_tx.unbounded_send(WsEnvelope::new(cmd));
    }

    fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

/// Connection management loop: connect, pump frames both ways, reconnect.
async fn run_loop(
    url: Url,
    reconnect: ReconnectConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    mut cmd_rx: UnboundedReceiver<WsEnvelope<ClientCommand>>,
    listeners: Listeners,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt = 0u32;

    'outer: loop {
        if *shutdown.borrow() {
            break;
        }

        state.send_replace(if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting { attempt }
        });

        let stream = tokio::select! {
            _ = shutdown.changed() => break 'outer,
            res = connect_async(url.as_str()) => match res {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    tracing::warn!(%url, error = %e, "websocket connect failed");
                    if reconnect.max_attempts > 0 && attempt >= reconnect.max_attempts {
                        tracing::error!(%url, "reconnect attempts exhausted");
                        break 'outer;
                    }
                    let delay = reconnect.delay_for_attempt(attempt);
                    tracing::info!(%url, delay_ms = delay, attempt = attempt + 1, "retrying");
                    tokio::select! {
                        _ = shutdown.changed() => break 'outer,
                        _ = tokio::time::sleep(Duration::from_millis(u64::from(delay))) => {}
                    }
                    attempt += 1;
                    continue;
                }
            },
        };

        state.send_replace(ConnectionState::Connected);
        attempt = 0;
        tracing::info!(%url, "websocket connected");

        let (mut write, mut read) = stream.split();

        // Single pump for both directions. Inbound frames are fanned out
        // inline, so per-channel delivery order equals arrival order.
        loop {
            tokio::select! {
                _ = shutdown.changed() => break 'outer,
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsEnvelope<ServerEvent>>(text.as_str()) {
                            Ok(envelope) => fan_out(&listeners, envelope),
                            Err(e) => {
                                tracing::warn!(error = %e, "dropping malformed inbound frame")
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(%url, "websocket closed by server");
                        break;
                    }
                    // Pong for pings is queued by tungstenite itself.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket read error");
                        break;
                    }
                },
                cmd = cmd_rx.next() => match cmd {
                    Some(envelope) => match serde_json::to_string(&envelope) {
                        Ok(json) => {
                            tracing::debug!(%json, "sending command");
                            if let Err(e) = write.send(Message::text(json)).await {
                                tracing::warn!(error = %e, "websocket send failed");
                                break;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "command serialize failed"),
                    },
                    // All command senders dropped; the connection owner is gone.
                    None => break 'outer,
                },
            }
        }

        // Unexpected drop: go straight to Reconnecting so observers see
        // Connected -> Reconnecting -> Connected, then back off briefly.
        attempt = 1;
        state.send_replace(ConnectionState::Reconnecting { attempt });
        let delay = reconnect.delay_for_attempt(0);
        tokio::select! {
            _ = shutdown.changed() => break 'outer,
            _ = tokio::time::sleep(Duration::from_millis(u64::from(delay))) => {}
        }
    }

    state.send_replace(ConnectionState::Disconnected);
}

fn fan_out(listeners: &Listeners, envelope: WsEnvelope<ServerEvent>) {
    let snapshot: Vec<RawEventHandler> = listeners
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    for listener in snapshot {
        listener(envelope.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_capped_exponential() {
        let config = ReconnectConfig {
            max_attempts: 0,
            initial_delay_ms: 1000,
            max_delay_ms: 4000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 2000);
        assert_eq!(config.delay_for_attempt(2), 4000);
        // Capped from here on.
        assert_eq!(config.delay_for_attempt(3), 4000);
        assert_eq!(config.delay_for_attempt(10), 4000);
    }

    #[test]
    fn state_helpers() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting { attempt: 3 }.is_connecting());
        assert!(!ConnectionState::Disconnected.is_connecting());
    }

    #[tokio::test]
    async fn send_is_noop_while_not_connected() {
        let config = RealtimeConfig::new("ws://127.0.0.1:9").unwrap();
        let connection = Connection::connect(&config);

        // Nothing is listening on that port, so the link never connects;
        // sends must be silently dropped rather than queued or raised.
        assert!(!connection.state().is_connected());
        connection.send(ClientCommand::JoinChannel {
            channel: servicedesk_shared::ChannelKey::requests_global(),
        });

        connection.disconnect();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        // Idempotent teardown.
        connection.disconnect();
    }
}
