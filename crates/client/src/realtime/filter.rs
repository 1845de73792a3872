//! Event scoping: shape validation, event-to-channel routing, and the
//! scope predicates consumers attach to their subscriptions.

use std::sync::Arc;

use servicedesk_shared::{ChannelKey, RealtimeError, ServerEvent};

use super::registry::ScopeFilter;

/// Shape checks beyond what serde's topic decode already guarantees. A
/// failing event is dropped before fan-out; it never reaches a subscriber.
pub fn validate(event: &ServerEvent) -> Result<(), RealtimeError> {
    let malformed = |reason: &str| RealtimeError::MalformedEvent {
        topic: event.topic(),
        reason: reason.to_string(),
    };
    match event {
        ServerEvent::NewServiceRequest(request) | ServerEvent::ServiceRequestUpdated(request) => {
            if request.id.is_empty() {
                return Err(malformed("empty request id"));
            }
        }
        ServerEvent::NewChatMessage(message) => {
            if message.id.is_empty() {
                return Err(malformed("empty message id"));
            }
            if message.chat_id < 0 {
                return Err(malformed("negative chat_id"));
            }
        }
        ServerEvent::Notification(notification) => {
            if notification.id.is_empty() {
                return Err(malformed("empty notification id"));
            }
            if notification.user_id < 0 {
                return Err(malformed("negative user_id"));
            }
        }
    }
    Ok(())
}

/// The logical channel an inbound event belongs to. Routing plus each
/// subscriber's scope predicate together guarantee no cross-scope leakage.
pub fn channel_for_event(event: &ServerEvent) -> ChannelKey {
    match event {
        ServerEvent::NewServiceRequest(_) | ServerEvent::ServiceRequestUpdated(_) => {
            ChannelKey::requests_global()
        }
        ServerEvent::NewChatMessage(message) => ChannelKey::chat(message.chat_id),
        ServerEvent::Notification(notification) => ChannelKey::notifications(notification.user_id),
    }
}

/// Ready-made scope predicates.
pub mod scope {
    use super::*;

    /// Accept every event on the channel.
    pub fn any() -> ScopeFilter {
        Arc::new(|_| true)
    }

    /// Chat messages for one chat id only.
    pub fn chat(chat_id: i64) -> ScopeFilter {
        Arc::new(move |event| {
            matches!(event, ServerEvent::NewChatMessage(m) if m.chat_id == chat_id)
        })
    }

    /// Notifications targeted at one user only.
    pub fn notifications(user_id: i64) -> ScopeFilter {
        Arc::new(move |event| {
            matches!(event, ServerEvent::Notification(n) if n.user_id == user_id)
        })
    }

    /// Service-request events (creations and status changes).
    pub fn requests() -> ScopeFilter {
        Arc::new(|event| {
            matches!(
                event,
                ServerEvent::NewServiceRequest(_) | ServerEvent::ServiceRequestUpdated(_)
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use servicedesk_shared::{ChatMessage, Notification, RequestStatus, ServiceRequest};

    use super::*;

    fn chat_event(chat_id: i64) -> ServerEvent {
        ServerEvent::NewChatMessage(ChatMessage {
            id: "m-1".to_string(),
            chat_id,
            sender_id: "u-1".to_string(),
            body: "hi".to_string(),
            sent_at: Utc::now(),
        })
    }

    fn notification_event(user_id: i64) -> ServerEvent {
        ServerEvent::Notification(Notification {
            id: "n-1".to_string(),
            user_id,
            body: "ping".to_string(),
            created_at: Utc::now(),
        })
    }

    fn request_event() -> ServerEvent {
        ServerEvent::NewServiceRequest(ServiceRequest {
            id: "r-1".to_string(),
            title: "vpn down".to_string(),
            description: None,
            status: RequestStatus::Open,
            created_by: "u-2".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn events_route_to_their_channel() {
        assert_eq!(channel_for_event(&chat_event(42)), ChannelKey::chat(42));
        assert_eq!(
            channel_for_event(&notification_event(7)),
            ChannelKey::notifications(7)
        );
        assert_eq!(
            channel_for_event(&request_event()),
            ChannelKey::requests_global()
        );
    }

    #[test]
    fn scope_predicates_match_by_id() {
        assert!(scope::chat(42)(&chat_event(42)));
        assert!(!scope::chat(42)(&chat_event(7)));
        assert!(!scope::chat(42)(&notification_event(42)));

        assert!(scope::notifications(7)(&notification_event(7)));
        assert!(!scope::notifications(7)(&notification_event(9)));

        assert!(scope::requests()(&request_event()));
        assert!(!scope::requests()(&chat_event(1)));

        assert!(scope::any()(&chat_event(1)));
    }

    #[test]
    fn validation_rejects_broken_shapes() {
        assert!(validate(&chat_event(42)).is_ok());

        let mut missing_id = chat_event(42);
        if let ServerEvent::NewChatMessage(m) = &mut missing_id {
            m.id.clear();
        }
        assert!(matches!(
            validate(&missing_id),
            Err(RealtimeError::MalformedEvent {
                topic: "new-chat-message",
                ..
            })
        ));

        assert!(validate(&chat_event(-1)).is_err());
        assert!(validate(&notification_event(-3)).is_err());
    }
}
