//! Event bus: the single surface through which local listeners, other
//! same-device processes, and the authoritative server exchange events.
//!
//! Dispatch is synchronous: `publish` runs every matching handler before it
//! returns. The two transports hang off the bus: a [`BroadcastHub`] for
//! same-device fan-out and the Remote Link for the authority. Loop
//! prevention guarantees no listener sees one originating publish twice:
//! a bus never re-receives its own broadcast frame, and inbound frames are
//! never re-forwarded.

mod broadcast;
mod link;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

pub use broadcast::BroadcastHub;
pub use link::ConnectionState;

use crate::config::SyncConfig;
use crate::protocol::{ClientMessage, ServerMessage};
use broadcast::Frame;
use link::RemoteLink;

/// Well-known event names.
pub mod topics {
    /// Wildcard sentinel: receives every event together with its name.
    pub const WILDCARD: &str = "*";
    /// The state tree changed; payload is `{path, value}`, where a path of
    /// `"*"` means "everything may have changed".
    pub const STORE_CHANGED: &str = "store:changed";
    /// Complete authoritative tree arrived; payload is the tree.
    pub const SERVER_FULL_STATE: &str = "server:full-state";
    /// Single authoritative mutation arrived; payload is `{path, value}`.
    pub const SERVER_STATE_CHANGE: &str = "server:state-change";
    /// The Remote Link just opened.
    pub const WS_CONNECTED: &str = "ws:connected";
}

/// Where an event entered this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Published by code in this process.
    Local,
    /// Arrived over the local broadcast transport from another process on
    /// this device.
    Broadcast,
    /// Arrived over the Remote Link from the authority.
    Remote,
}

/// Handler signature for all subscriptions. The event name is always passed
/// so one handler can serve the wildcard.
pub type Handler = dyn Fn(&str, &Value, Origin) -> anyhow::Result<()> + Send + Sync;

struct Registration {
    id: u64,
    handler: Arc<Handler>,
}

pub(crate) struct BusInner {
    /// Per-process identity, used to filter our own broadcast frames.
    id: Uuid,
    listeners: RwLock<HashMap<String, Vec<Registration>>>,
    next_registration: AtomicU64,
    hub: Option<BroadcastHub>,
    pub(crate) link: RemoteLink,
}

/// Cheaply clonable handle to one process's event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Build a bus from configuration, optionally attached to a broadcast
    /// hub shared with other engine instances on this device.
    ///
    /// Attaching a hub spawns the receive pump, so a hub-attached bus must
    /// be created inside a tokio runtime. The Remote Link does not connect
    /// until [`EventBus::connect`].
    pub fn new(config: &SyncConfig, hub: Option<BroadcastHub>) -> Self {
        let inner = Arc::new(BusInner {
            id: Uuid::new_v4(),
            listeners: RwLock::new(HashMap::new()),
            next_registration: AtomicU64::new(0),
            hub: hub.clone(),
            link: RemoteLink::new(
                config.ws_url(),
                config.retry_delay(),
                config.connect_retry_delay(),
            ),
        });

        if let Some(hub) = hub {
            spawn_broadcast_pump(hub, Arc::downgrade(&inner));
        }

        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<BusInner>) -> Self {
        Self { inner }
    }

    /// Register a handler for `event` (or [`topics::WILDCARD`] for all
    /// events). The returned capability removes exactly this registration;
    /// revoking twice is a no-op. Handlers stay registered until revoked;
    /// dropping the `Subscription` does not unsubscribe.
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&str, &Value, Origin) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_registration.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            event: event.to_string(),
            id,
            revoked: AtomicBool::new(false),
        }
    }

    /// Deliver `event` synchronously to all local handlers; if `broadcast`
    /// is set, also forward it to other processes on this device. This
    /// process will not re-receive its own broadcast.
    pub fn publish(&self, event: &str, payload: Value, broadcast: bool) {
        self.dispatch(event, &payload, Origin::Local);
        if broadcast {
            if let Some(hub) = &self.inner.hub {
                hub.send(Frame {
                    sender: self.inner.id,
                    event: event.to_string(),
                    payload,
                });
            }
        }
    }

    /// Forward a domain event to the authority. Dropped if the Remote Link
    /// is not ready.
    pub fn publish_remote(&self, event: &str, payload: Value) {
        self.inner.link.send(ClientMessage::Event {
            event: event.to_string(),
            payload,
        });
    }

    /// Forward a state mutation to the authority. Dropped if the Remote Link
    /// is not ready. This is a network-only call; it never touches the
    /// local tree.
    pub fn send_mutation(&self, path: &str, value: Value) {
        self.inner.link.send(ClientMessage::Set {
            path: path.to_string(),
            value,
        });
    }

    /// Ask the authority to create an order as one atomic mutation.
    pub fn create_order(&self, order: Value) {
        self.inner.link.send(ClientMessage::CreateOrder { order });
    }

    /// Establish the Remote Link. Connection attempts are serialized in one
    /// owner task; calling this more than once has no effect.
    pub fn connect(&self) {
        if self.inner.link.mark_started() {
            tokio::spawn(link::run(Arc::downgrade(&self.inner)));
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.link.state()
    }

    /// Run exact-name handlers, then wildcard handlers, in subscription
    /// order. A failing handler is reported and skipped; delivery continues.
    pub(crate) fn dispatch(&self, event: &str, payload: &Value, origin: Origin) {
        self.run_handlers(event, event, payload, origin);
        if event != topics::WILDCARD {
            self.run_handlers(topics::WILDCARD, event, payload, origin);
        }
    }

    fn run_handlers(&self, key: &str, event: &str, payload: &Value, origin: Origin) {
        // Clone the handler list out of the lock so a handler can subscribe
        // or revoke without deadlocking.
        let handlers: Vec<Arc<Handler>> = {
            let listeners = self.inner.listeners.read();
            listeners
                .get(key)
                .map(|registrations| {
                    registrations
                        .iter()
                        .map(|registration| Arc::clone(&registration.handler))
                        .collect()
                })
                .unwrap_or_default()
        };
        for handler in handlers {
            if let Err(error) = handler(event, payload, origin) {
                tracing::error!(event, %error, "event handler failed");
            }
        }
    }

    /// Dispatch one authoritative frame as a local event. Server-originated
    /// frames are never re-broadcast locally; the authority already
    /// distributed them to every client.
    pub(crate) fn handle_server_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::FullState { state } => {
                self.dispatch(topics::SERVER_FULL_STATE, &state, Origin::Remote);
            }
            ServerMessage::StateChange { path, value } => {
                self.dispatch(
                    topics::SERVER_STATE_CHANGE,
                    &json!({ "path": path, "value": value }),
                    Origin::Remote,
                );
            }
            ServerMessage::Event { event, payload } => {
                self.dispatch(&event, &payload, Origin::Remote);
            }
        }
    }
}

/// Receive pump for the local broadcast transport. Frames from this bus are
/// skipped (loop prevention) and inbound frames are never re-forwarded to
/// either transport (no broadcast storms). Exits when the bus is dropped.
fn spawn_broadcast_pump(hub: BroadcastHub, bus: Weak<BusInner>) {
    let mut frames = hub.attach();
    tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(frame) => {
                    let Some(inner) = bus.upgrade() else { return };
                    if frame.sender == inner.id {
                        continue;
                    }
                    EventBus::from_inner(inner).dispatch(
                        &frame.event,
                        &frame.payload,
                        Origin::Broadcast,
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "broadcast receiver lagged; frames skipped");
                }
                Err(RecvError::Closed) => return,
            }
        }
    });
}

/// Capability to remove one registration. Owned by whichever caller
/// subscribed; revocation is explicit and idempotent.
pub struct Subscription {
    bus: Weak<BusInner>,
    event: String,
    id: u64,
    revoked: AtomicBool,
}

impl Subscription {
    pub fn revoke(&self) {
        if self.revoked.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            let mut listeners = inner.listeners.write();
            if let Some(registrations) = listeners.get_mut(&self.event) {
                registrations.retain(|registration| registration.id != self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn local_bus() -> EventBus {
        EventBus::new(&SyncConfig::default(), None)
    }

    #[test]
    fn publish_reaches_subscriber_once() {
        let bus = local_bus();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let _sub = bus.subscribe("order:created", move |_event, payload, origin| {
            assert_eq!(payload, &json!({ "orderNumber": 7 }));
            assert_eq!(origin, Origin::Local);
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("order:created", json!({ "orderNumber": 7 }), true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wildcard_receives_every_event_with_its_name() {
        let bus = local_bus();
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        let _sub = bus.subscribe(topics::WILDCARD, move |event, _payload, _origin| {
            sink.lock().unwrap().push(event.to_string());
            Ok(())
        });

        bus.publish("menu:updated", json!(null), false);
        bus.publish("order:created", json!({}), false);
        assert_eq!(
            *names.lock().unwrap(),
            vec!["menu:updated".to_string(), "order:created".to_string()]
        );
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = local_bus();
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        let _a = bus.subscribe("tick", move |_, _, _| {
            first.lock().unwrap().push("first");
            Ok(())
        });
        let _b = bus.subscribe("tick", move |_, _, _| {
            second.lock().unwrap().push("second");
            Ok(())
        });

        bus.publish("tick", json!(null), false);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn failing_handler_does_not_stop_delivery() {
        let bus = local_bus();
        let delivered = Arc::new(AtomicUsize::new(0));
        let _bad = bus.subscribe("tick", |_, _, _| anyhow::bail!("handler exploded"));
        let seen = Arc::clone(&delivered);
        let _good = bus.subscribe("tick", move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("tick", json!(null), false);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn revoke_removes_exactly_one_registration() {
        let bus = local_bus();
        let calls = Arc::new(AtomicUsize::new(0));
        let kept = Arc::clone(&calls);
        let gone = Arc::clone(&calls);
        let _kept = bus.subscribe("tick", move |_, _, _| {
            kept.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let revoked = bus.subscribe("tick", move |_, _, _| {
            gone.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        revoked.revoke();
        revoked.revoke(); // second revoke is a no-op
        bus.publish("tick", json!(null), false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn server_messages_dispatch_as_typed_events() {
        let bus = local_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe(topics::WILDCARD, move |event, payload, origin| {
            assert_eq!(origin, Origin::Remote);
            sink.lock().unwrap().push((event.to_string(), payload.clone()));
            Ok(())
        });

        bus.handle_server_message(ServerMessage::FullState {
            state: json!({ "orders": [] }),
        });
        bus.handle_server_message(ServerMessage::StateChange {
            path: "settings.taxRate".to_string(),
            value: json!(12),
        });
        bus.handle_server_message(ServerMessage::Event {
            event: "order:dismissed".to_string(),
            payload: json!({ "orderNumber": 3 }),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, topics::SERVER_FULL_STATE);
        assert_eq!(seen[0].1, json!({ "orders": [] }));
        assert_eq!(seen[1].0, topics::SERVER_STATE_CHANGE);
        assert_eq!(
            seen[1].1,
            json!({ "path": "settings.taxRate", "value": 12 })
        );
        assert_eq!(seen[2].0, "order:dismissed");
    }

    #[test]
    fn send_mutation_while_disconnected_is_a_silent_noop() {
        let bus = local_bus();
        assert_eq!(bus.connection_state(), ConnectionState::Disconnected);
        // No link task was ever started; these must drop without panicking.
        bus.send_mutation("settings.taxRate", json!(12));
        bus.publish_remote("menu:updated", json!(null));
        bus.create_order(json!({ "tableId": "t1" }));
    }
}
