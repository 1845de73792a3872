//! Entity models carried by real-time events, plus the channel key type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Channels ---

/// Opaque key identifying one logical topic of related events.
///
/// Equal keys denote the same logical channel no matter how many consumers
/// hold subscriptions to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Channel carrying messages for a single chat.
    pub fn chat(chat_id: i64) -> Self {
        Self(format!("chat:{chat_id}"))
    }

    /// Channel carrying notifications targeted at one user.
    pub fn notifications(user_id: i64) -> Self {
        Self(format!("notifications:{user_id}"))
    }

    /// The global service-request feed.
    pub fn requests_global() -> Self {
        Self("requests:global".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Service requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: RequestStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Chat ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: i64,
    pub sender_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

// --- Notifications ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_keys_are_stable_per_topic() {
        assert_eq!(ChannelKey::chat(42), ChannelKey::chat(42));
        assert_ne!(ChannelKey::chat(42), ChannelKey::chat(7));
        assert_eq!(ChannelKey::chat(42).as_str(), "chat:42");
        assert_eq!(ChannelKey::notifications(7).as_str(), "notifications:7");
        assert_eq!(ChannelKey::requests_global().as_str(), "requests:global");
    }

    #[test]
    fn channel_key_serializes_as_plain_string() {
        let json = serde_json::to_string(&ChannelKey::chat(9)).unwrap();
        assert_eq!(json, "\"chat:9\"");
        let back: ChannelKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChannelKey::chat(9));
    }
}
