//! Real-time event distribution.
//!
//! One physical WebSocket connection is multiplexed into many independent
//! logical subscriptions:
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  RealtimeClient                  │
//! └──────────────────────────────────────────────────┘
//!          │                    │              │
//!          ▼                    ▼              ▼
//!   ┌────────────┐      ┌───────────────┐ ┌─────────────┐
//!   │ Connection │─────▶│ChannelRegistry│ │ Reconnection│
//!   │ (socket,   │ raw  │ (ref-counted  │ │ Coordinator │
//!   │  backoff)  │events│  join/leave,  │ │ (join       │
//!   └────────────┘      │  fan-out)     │ │  replay)    │
//!                       └───────────────┘ └─────────────┘
//!                          │     │     │
//!                          ▼     ▼     ▼
//!                     Subscription handles
//!                     (one per UI consumer)
//! ```
//!
//! Consumers call [`RealtimeClient::subscribe`] on mount and drop (or
//! explicitly unsubscribe) the returned [`Subscription`] on unmount. The
//! first subscription to a channel joins the server-side room, the last one
//! out leaves it, and a reconnect replays every join transparently.

mod client;
mod connection;
mod coordinator;
mod filter;
mod registry;
mod subscription;

pub use client::RealtimeClient;
pub use connection::{Connection, ConnectionState, ControlLink, ReconnectConfig};
pub use coordinator::ReconnectionCoordinator;
pub use filter::{channel_for_event, scope, validate};
pub use registry::{ChannelRegistry, EventCallback, ScopeFilter};
pub use subscription::Subscription;
