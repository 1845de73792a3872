//! Wire protocol for the real-time connection.
//!
//! Every frame is a JSON-encoded [`WsEnvelope`] wrapping either a
//! [`ClientCommand`] (client -> server) or a [`ServerEvent`] (server ->
//! client). Topic names on the wire are the kebab-case variant names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChannelKey, ChatMessage, Notification, ServiceRequest};

/// Envelope for every frame on the real-time connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEnvelope<T> {
    pub id: String,
    #[serde(flatten)]
    pub payload: T,
    pub ts: DateTime<Utc>,
}

impl<T> WsEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            ts: Utc::now(),
        }
    }
}

/// Control messages sent by the client.
///
/// The server treats duplicate joins and leaves for the same channel as
/// idempotent; the client relies on that when it replays joins after a
/// reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    JoinChannel { channel: ChannelKey },
    LeaveChannel { channel: ChannelKey },
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewServiceRequest(ServiceRequest),
    ServiceRequestUpdated(ServiceRequest),
    NewChatMessage(ChatMessage),
    Notification(Notification),
}

impl ServerEvent {
    /// Wire topic name of this event.
    pub fn topic(&self) -> &'static str {
        match self {
            ServerEvent::NewServiceRequest(_) => "new-service-request",
            ServerEvent::ServiceRequestUpdated(_) => "service-request-updated",
            ServerEvent::NewChatMessage(_) => "new-chat-message",
            ServerEvent::Notification(_) => "notification",
        }
    }
}
