//! Shared data models, push protocol and error types for lanescore.
//!
//! Everything in this crate mirrors the backend's wire shapes; the client
//! crate builds its session and scoring logic on top of these types.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::{ErrorBody, GatewayError};
pub use models::*;
pub use protocol::{MessageKind, SyncMessage};
