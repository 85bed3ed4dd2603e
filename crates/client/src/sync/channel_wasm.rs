//! Web sync channel on `web_sys::WebSocket`.
//!
//! Single-threaded: everything lives behind `Rc`/`RefCell` and runs on the
//! browser event loop via `spawn_local`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys;

use lanescore_shared::{MessageKind, SyncMessage};

use super::{ConnectionState, Dispatcher, Handler, ReconnectConfig};
use crate::{log_debug, log_error, log_info};

pub struct SyncChannel {
    url: String,
    state: Rc<RefCell<ConnectionState>>,
    dispatcher: Rc<RefCell<Dispatcher>>,
    socket: Rc<RefCell<Option<web_sys::WebSocket>>>,
    closed: Rc<Cell<bool>>,
    started: Cell<bool>,
    config: ReconnectConfig,
}

impl SyncChannel {
    pub fn new(url: String) -> Self {
        Self::with_config(url, ReconnectConfig::default())
    }

    pub fn with_config(url: String, config: ReconnectConfig) -> Self {
        Self {
            url,
            state: Rc::new(RefCell::new(ConnectionState::Disconnected)),
            dispatcher: Rc::new(RefCell::new(Dispatcher::default())),
            socket: Rc::new(RefCell::new(None)),
            closed: Rc::new(Cell::new(false)),
            started: Cell::new(false),
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn register(&self, kind: MessageKind, handler: Handler) {
        self.dispatcher.borrow_mut().register(kind, handler);
    }

    /// Send a message, dropping it with a log line when not connected.
    pub fn send(&self, message: &SyncMessage) -> bool {
        if !self.state().is_connected() {
            log_debug!("sync send dropped, channel not connected");
            return false;
        }
        let socket = self.socket.borrow();
        // readyState 1 = OPEN
        let Some(ws) = socket.as_ref().filter(|ws| ws.ready_state() == 1) else {
            log_debug!("sync send dropped, socket not open");
            return false;
        };
        match serde_json::to_string(message) {
            Ok(json) => ws.send_with_str(&json).is_ok(),
            Err(e) => {
                log_error!("sync serialize failed: {}", e);
                false
            }
        }
    }

    /// Stop the channel and suppress reconnects.
    pub fn disconnect(&self) {
        self.closed.set(true);
        if let Some(ws) = self.socket.borrow_mut().take() {
            let _ = ws.close();
        }
        *self.state.borrow_mut() = ConnectionState::Disconnected;
    }

    /// Start the connection loop. A second call is a no-op.
    pub fn connect(&self) {
        if self.started.replace(true) {
            return;
        }
        let url = self.url.clone();
        let state = self.state.clone();
        let dispatcher = self.dispatcher.clone();
        let socket = self.socket.clone();
        let closed = self.closed.clone();
        let config = self.config.clone();

        spawn_local(async move {
            let mut attempt = 0u32;

            loop {
                if closed.get() {
                    break;
                }

                *state.borrow_mut() = if attempt == 0 {
                    ConnectionState::Connecting
                } else {
                    ConnectionState::Reconnecting { attempt }
                };

                match open_socket(&url, dispatcher.clone()).await {
                    Ok((ws, mut close_rx)) => {
                        *state.borrow_mut() = ConnectionState::Connected;
                        attempt = 0;
                        *socket.borrow_mut() = Some(ws);
                        log_info!("sync channel connected to {}", url);

                        // Parked until the socket closes for any reason.
                        use futures_util::StreamExt;
                        close_rx.next().await;

                        socket.borrow_mut().take();
                        log_info!("sync channel to {} closed", url);
                        *state.borrow_mut() = ConnectionState::Disconnected;
                    }
                    Err(e) => {
                        log_error!("sync connect error for {}: {}", url, e);
                    }
                }

                if closed.get() {
                    break;
                }

                if config.max_attempts > 0 && attempt >= config.max_attempts {
                    // Give up quietly; the read paths keep polling over HTTP.
                    *state.borrow_mut() = ConnectionState::Failed {
                        reason: format!("gave up after {} attempts", config.max_attempts),
                    };
                    return;
                }

                log_info!(
                    "sync reconnecting to {} in {}ms (attempt {})",
                    url,
                    config.delay_ms,
                    attempt + 1
                );
                gloo_timers::future::TimeoutFuture::new(config.delay_ms).await;
                attempt += 1;
            }

            *state.borrow_mut() = ConnectionState::Disconnected;
        });
    }
}

/// Open a socket, wire the callbacks and wait for it to become ready.
/// Returns the socket plus a channel that fires once when it closes.
async fn open_socket(
    url: &str,
    dispatcher: Rc<RefCell<Dispatcher>>,
) -> Result<
    (
        web_sys::WebSocket,
        futures_channel::mpsc::UnboundedReceiver<()>,
    ),
    String,
> {
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    let ws = WebSocket::new(url).map_err(|e| format!("socket create failed: {e:?}"))?;

    let is_open = Rc::new(Cell::new(false));
    let error_reason = Rc::new(RefCell::new(None::<String>));
    let (close_tx, close_rx) = futures_channel::mpsc::unbounded::<()>();

    let is_open_clone = is_open.clone();
    let onopen = Closure::wrap(Box::new(move |_: web_sys::Event| {
        is_open_clone.set(true);
    }) as Box<dyn FnMut(web_sys::Event)>);
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    onopen.forget();

    let error_reason_close = error_reason.clone();
    let onclose = Closure::wrap(Box::new(move |e: CloseEvent| {
        let reason = if e.reason().is_empty() {
            format!("code {}", e.code())
        } else {
            e.reason()
        };
        *error_reason_close.borrow_mut() = Some(reason);
        let _ = close_tx.unbounded_send(());
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
    onclose.forget();

    let error_reason_err = error_reason.clone();
    let onerror = Closure::wrap(Box::new(move |_: ErrorEvent| {
        *error_reason_err.borrow_mut() = Some("socket error".to_string());
    }) as Box<dyn FnMut(ErrorEvent)>);
    ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
    onerror.forget();

    let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
        if let Ok(text) = e.data().dyn_into::<js_sys::JsString>() {
            let text: String = text.into();
            match serde_json::from_str::<SyncMessage>(&text) {
                Ok(message) => {
                    dispatcher.borrow().dispatch(&message);
                }
                // Unknown kinds are fine, newer servers may emit them.
                Err(e) => log_debug!("ignoring sync frame: {}", e),
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget();

    // Poll for open with a 5 second ceiling, yielding so callbacks fire.
    for _ in 0..500 {
        if is_open.get() {
            return Ok((ws, close_rx));
        }
        if let Some(reason) = error_reason.borrow().clone() {
            return Err(reason);
        }
        gloo_timers::future::TimeoutFuture::new(10).await;
    }

    Err("connection timeout".to_string())
}
