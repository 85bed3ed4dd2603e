//! Real-time sync channel: one WebSocket per event subscription with
//! auto-reconnect and per-kind message dispatch.
//!
//! The platform implementations share the state machine and dispatcher
//! defined here; only the socket plumbing differs.

use std::collections::HashMap;

use lanescore_shared::{MessageKind, SyncMessage};

#[cfg(not(target_arch = "wasm32"))]
mod channel_native;
#[cfg(target_arch = "wasm32")]
mod channel_wasm;

#[cfg(not(target_arch = "wasm32"))]
pub use channel_native::SyncChannel;
#[cfg(target_arch = "wasm32")]
pub use channel_wasm::SyncChannel;

/// Connection lifecycle as observed by the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Reconnect policy: a fixed delay between attempts, a bounded number of
/// attempts, then give up without alerting (polling covers the gap).
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub delay_ms: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 3000,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub type Handler = Box<dyn Fn(&SyncMessage) + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub type Handler = Box<dyn Fn(&SyncMessage)>;

/// Routes incoming messages to the handlers registered for their kind.
/// Handlers for the same kind run synchronously in registration order; a
/// message with no handlers is dropped silently.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageKind, Vec<Handler>>,
}

impl Dispatcher {
    pub fn register(&mut self, kind: MessageKind, handler: Handler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, message: &SyncMessage) -> usize {
        match self.handlers.get(&message.kind()) {
            Some(handlers) => {
                for handler in handlers {
                    handler(message);
                }
                handlers.len()
            }
            None => 0,
        }
    }
}
