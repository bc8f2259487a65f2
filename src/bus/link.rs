//! Remote Link: the persistent WebSocket connection to the authoritative
//! server.
//!
//! One owner task drives an explicit `Disconnected → Connecting → Ready`
//! state machine and retries forever, so "at most one pending retry" holds
//! structurally. Outbound messages are accepted only while the socket is
//! open; anything sent while disconnected is dropped, not queued. The next
//! `FULL_STATE` push closes any resulting gap.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Weak;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::bus::{topics, BusInner, EventBus, Origin};
use crate::protocol::{ClientMessage, ServerMessage};

/// Connection lifecycle of the Remote Link. There is no terminal state while
/// the process lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Ready = 2,
}

pub(crate) struct RemoteLink {
    url: String,
    retry: Duration,
    connect_retry: Duration,
    state: AtomicU8,
    /// Populated only while the socket is open, which makes
    /// drop-while-disconnected structural rather than a convention.
    sender: RwLock<Option<mpsc::UnboundedSender<ClientMessage>>>,
    started: AtomicBool,
}

impl RemoteLink {
    pub(crate) fn new(url: String, retry: Duration, connect_retry: Duration) -> Self {
        Self {
            url,
            retry,
            connect_retry,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            sender: RwLock::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::SeqCst) {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            _ => ConnectionState::Ready,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Returns true the first time only; the owner task is spawned once.
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    /// Forward a message to the authority if the link is ready; silently
    /// dropped otherwise.
    pub(crate) fn send(&self, message: ClientMessage) {
        match self.sender.read().as_ref() {
            Some(tx) => {
                if tx.send(message).is_err() {
                    tracing::debug!("sync link task gone; outbound message dropped");
                }
            }
            None => {
                tracing::debug!("sync link not ready; outbound message dropped");
            }
        }
    }
}

/// Owner task for the Remote Link. Exits when the bus is dropped.
pub(crate) async fn run(bus: Weak<BusInner>) {
    loop {
        let Some(inner) = bus.upgrade() else { return };
        let url = inner.link.url.clone();
        inner.link.set_state(ConnectionState::Connecting);
        tracing::debug!(%url, "connecting to sync server");

        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                tracing::info!(%url, "connected to sync server");
                let (tx, rx) = mpsc::unbounded_channel();
                *inner.link.sender.write() = Some(tx);
                inner.link.set_state(ConnectionState::Ready);
                EventBus::from_inner(inner.clone()).dispatch(
                    topics::WS_CONNECTED,
                    &Value::Null,
                    Origin::Local,
                );

                let retry = inner.link.retry;
                drop(inner);
                pump(socket, rx, &bus).await;

                if let Some(inner) = bus.upgrade() {
                    *inner.link.sender.write() = None;
                    inner.link.set_state(ConnectionState::Disconnected);
                }
                tracing::info!(delay_secs = retry.as_secs(), "sync link closed; will retry");
                tokio::time::sleep(retry).await;
            }
            Err(error) => {
                inner.link.set_state(ConnectionState::Disconnected);
                let delay = inner.link.connect_retry;
                tracing::warn!(
                    %error,
                    delay_secs = delay.as_secs(),
                    "sync server unreachable; will retry"
                );
                drop(inner);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Pump one open socket until it closes: outbound frames from the sender
/// slot, inbound frames into bus dispatch.
async fn pump(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
    bus: &Weak<BusInner>,
) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(message) = queued else { break };
                if let Err(error) = sink.send(Message::Text(message.encode())).await {
                    tracing::debug!(%error, "sync link write failed");
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(raw))) => {
                        let Some(inner) = bus.upgrade() else { return };
                        if let Some(message) = ServerMessage::decode(&raw) {
                            EventBus::from_inner(inner).handle_server_message(message);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Pings and pongs are answered by tungstenite itself;
                    // the protocol never sends binary frames.
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(%error, "sync link read failed");
                        break;
                    }
                }
            }
        }
    }
}
