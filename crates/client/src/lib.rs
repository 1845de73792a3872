//! Servicedesk client - real-time event distribution layer.
//!
//! This crate owns the single WebSocket connection to a servicedesk server
//! and fans server-pushed events (new service requests, status changes, chat
//! messages, notifications) out to independent UI consumers, each with its
//! own channel subscription, scope filter, and lifecycle.

pub mod config;
pub mod realtime;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RealtimeConfig;
pub use realtime::{ConnectionState, RealtimeClient, Subscription};
