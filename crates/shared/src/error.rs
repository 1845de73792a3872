//! Error taxonomy for the real-time layer.
//!
//! Transport drops and refusals are deliberately absent: they are absorbed
//! into the connection state machine and recovered by reconnection, never
//! surfaced to consumers as errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RealtimeError {
    /// Missing or invalid endpoint configuration. Fatal, reported once at
    /// startup; never retried.
    #[error("invalid real-time endpoint: {0}")]
    Config(String),

    /// An inbound event failed shape validation for its topic. The event is
    /// dropped and logged; dispatch for other channels continues.
    #[error("malformed {topic} event: {reason}")]
    MalformedEvent {
        topic: &'static str,
        reason: String,
    },
}
