//! Native sync channel on tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use lanescore_shared::{MessageKind, SyncMessage};

use super::{ConnectionState, Dispatcher, Handler, ReconnectConfig};
use crate::{log_debug, log_error, log_info, log_warn};

pub struct SyncChannel {
    url: String,
    state: Arc<Mutex<ConnectionState>>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    sender: UnboundedSender<SyncMessage>,
    // Taken exactly once when the connection loop starts.
    receiver: Arc<Mutex<Option<UnboundedReceiver<SyncMessage>>>>,
    closed: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
    config: ReconnectConfig,
}

impl SyncChannel {
    pub fn new(url: String) -> Self {
        Self::with_config(url, ReconnectConfig::default())
    }

    pub fn with_config(url: String, config: ReconnectConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            url,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            dispatcher: Arc::new(Mutex::new(Dispatcher::default())),
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            closed: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(tokio::sync::Notify::new()),
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn register(&self, kind: MessageKind, handler: Handler) {
        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            dispatcher.register(kind, handler);
        }
    }

    /// Queue a message for the server. Dropped with a log line when the
    /// channel is not connected; outbound traffic is advisory only and the
    /// server rebuilds state from the API regardless.
    pub fn send(&self, message: &SyncMessage) -> bool {
        if !self.state().is_connected() {
            log_debug!("sync send dropped, channel not connected");
            return false;
        }
        match self.sender.unbounded_send(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                log_warn!("sync send failed: {}", e);
                false
            }
        }
    }

    /// Stop the channel. Suppresses any further reconnect attempts.
    pub fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        if let Ok(mut state) = self.state.lock() {
            *state = ConnectionState::Disconnected;
        }
    }

    /// Start the connection loop. A second call is a no-op.
    pub fn connect(&self) {
        let Some(receiver) = self.receiver.lock().ok().and_then(|mut r| r.take()) else {
            return;
        };
        let url = self.url.clone();
        let state = self.state.clone();
        let dispatcher = self.dispatcher.clone();
        let closed = self.closed.clone();
        let notify = self.notify.clone();
        let config = self.config.clone();

        tokio::spawn(run_loop(
            url, state, dispatcher, receiver, closed, notify, config,
        ));
    }
}

fn set_state(state: &Mutex<ConnectionState>, value: ConnectionState) {
    if let Ok(mut guard) = state.lock() {
        *guard = value;
    }
}

async fn run_loop(
    url: String,
    state: Arc<Mutex<ConnectionState>>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    mut receiver: UnboundedReceiver<SyncMessage>,
    closed: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
    config: ReconnectConfig,
) {
    let mut attempt = 0u32;

    'outer: loop {
        if closed.load(Ordering::SeqCst) {
            break;
        }

        if attempt == 0 {
            set_state(&state, ConnectionState::Connecting);
        } else {
            set_state(&state, ConnectionState::Reconnecting { attempt });
        }

        match connect_async(&url).await {
            Ok((stream, _response)) => {
                set_state(&state, ConnectionState::Connected);
                attempt = 0;
                log_info!("sync channel connected to {}", url);

                let (mut write, mut read) = stream.split();

                loop {
                    tokio::select! {
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<SyncMessage>(&text) {
                                    Ok(message) => {
                                        if let Ok(dispatcher) = dispatcher.lock() {
                                            dispatcher.dispatch(&message);
                                        }
                                    }
                                    // Unknown kinds are fine, newer servers
                                    // may emit them.
                                    Err(e) => log_debug!("ignoring sync frame: {}", e),
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(Message::Ping(_))) => {
                                // Pong is handled by tungstenite itself.
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                log_error!("sync read error: {}", e);
                                break;
                            }
                        },
                        outgoing = receiver.next() => match outgoing {
                            Some(message) => match serde_json::to_string(&message) {
                                Ok(json) => {
                                    if let Err(e) = write.send(Message::Text(json.into())).await {
                                        log_error!("sync send failed: {}", e);
                                        break;
                                    }
                                }
                                Err(e) => log_error!("sync serialize failed: {}", e),
                            },
                            None => break 'outer,
                        },
                        _ = notify.notified() => {
                            let _ = write.send(Message::Close(None)).await;
                            break 'outer;
                        }
                    }
                }

                log_info!("sync channel to {} closed", url);
                set_state(&state, ConnectionState::Disconnected);
            }
            Err(e) => {
                log_error!("sync connect error for {}: {}", url, e);
            }
        }

        if closed.load(Ordering::SeqCst) {
            break;
        }

        if config.max_attempts > 0 && attempt >= config.max_attempts {
            // Give up quietly; the read paths keep polling over HTTP.
            set_state(
                &state,
                ConnectionState::Failed {
                    reason: format!("gave up after {} attempts", config.max_attempts),
                },
            );
            return;
        }

        log_info!(
            "sync reconnecting to {} in {}ms (attempt {})",
            url,
            config.delay_ms,
            attempt + 1
        );
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(config.delay_ms as u64)) => {}
            _ = notify.notified() => break,
        }
        attempt += 1;
    }

    set_state(&state, ConnectionState::Disconnected);
}
