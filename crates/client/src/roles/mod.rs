//! Role drivers: one app-state object per client role, owning its gateway,
//! session store and sync channel. Created when the role is entered and
//! dropped on exit; nothing lives in module-level state.
//!
//! Push messages are never applied inside the channel's handler. Handlers
//! only forward into an app-owned queue; the app drains it with
//! `poll_push` and applies each message itself, so the appliers stay
//! plain async methods.

pub mod host;
pub mod lane;
pub mod viewer;

pub use host::HostApp;
pub use lane::LaneApp;
pub use viewer::ViewerApp;

use futures_channel::mpsc::{unbounded, UnboundedReceiver};

use lanescore_shared::{valid_code, GatewayError, MessageKind, SyncMessage, CODE_LEN};

use crate::sync::SyncChannel;

/// Reject malformed event codes before they ever hit the network.
pub(crate) fn check_code(code: &str) -> Result<(), GatewayError> {
    if valid_code(code) {
        Ok(())
    } else {
        Err(GatewayError::Validation(format!(
            "event code must be {CODE_LEN} letters or digits"
        )))
    }
}

/// Register a catch-all forwarder and hand back the queue end.
pub(crate) fn forward_all(channel: &SyncChannel) -> UnboundedReceiver<SyncMessage> {
    let (tx, rx) = unbounded();
    for kind in MessageKind::ALL {
        let tx = tx.clone();
        channel.register(
            kind,
            Box::new(move |message: &SyncMessage| {
                let _ = tx.unbounded_send(message.clone());
            }),
        );
    }
    rx
}

/// Drain one message from a push queue without blocking.
pub(crate) fn try_pop(
    rx: &mut Option<UnboundedReceiver<SyncMessage>>,
) -> Option<SyncMessage> {
    rx.as_mut()?.try_recv().ok()
}
