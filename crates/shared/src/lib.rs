//! Shared types for the servicedesk real-time protocol, used by the client
//! and by the (separately maintained) server.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
