//! Client configuration for the real-time connection.

use servicedesk_shared::RealtimeError;
use url::Url;

use crate::realtime::ReconnectConfig;

/// Configuration for [`crate::RealtimeClient`].
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint, `ws://` or `wss://`.
    pub endpoint: Url,
    /// Reconnect backoff behavior.
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    /// Parse and validate the endpoint. A missing or non-WebSocket endpoint
    /// is the one fatal startup error of the real-time layer.
    pub fn new(endpoint: &str) -> Result<Self, RealtimeError> {
        if endpoint.trim().is_empty() {
            return Err(RealtimeError::Config("endpoint is empty".to_string()));
        }
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RealtimeError::Config(format!("{endpoint}: {e}")))?;
        match endpoint.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(RealtimeError::Config(format!(
                    "unsupported scheme {other}, expected ws or wss"
                )))
            }
        }
        Ok(Self {
            endpoint,
            reconnect: ReconnectConfig::default(),
        })
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}
