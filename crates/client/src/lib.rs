//! Lanescore client core.
//!
//! Session and state-synchronization logic for the three competition roles:
//! host console, lane scoring client and read-only viewer. Presentation is
//! out of scope; this crate exposes the state objects and transitions a UI
//! layer drives.

pub mod config;
pub mod gateway;
pub mod logging;
pub mod roles;
pub mod session_store;
pub mod shot_entry;
pub mod storage;
pub mod sync;
pub mod view;

pub use config::Endpoints;
pub use gateway::Gateway;
pub use roles::{HostApp, LaneApp, ViewerApp};
pub use session_store::{Role, SessionStore};
pub use shot_entry::ShotEntry;
pub use sync::SyncChannel;
