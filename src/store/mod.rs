//! State store: the single current copy of the replicated state tree.
//!
//! The store owns the tree (all mutation goes through it so persistence and
//! change notification stay attached to every write), keeps a durable local
//! copy, and reconciles against authoritative snapshots and deltas arriving
//! on the event bus. Local writes are optimistic: the tree, the durable
//! copy, the outbound mutation and the `store:changed` notification all
//! happen before any authoritative acknowledgement.

mod persist;
mod seed;

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use thiserror::Error;

use crate::bus::{topics, EventBus, Subscription};
use crate::path::{self, PathError};

pub use persist::StateFile;
pub use seed::seed_tree;

/// Errors surfaced by store operations. Everything else (storage failures,
/// a disconnected link) degrades silently per the engine's error policy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
}

struct StoreInner {
    tree: RwLock<Value>,
    file: StateFile,
    bus: EventBus,
    /// Reconciliation subscriptions, held so they stay registered for the
    /// life of the store.
    reconciliation: Mutex<Vec<Subscription>>,
}

/// Handle to the process's state store. Clones share one tree.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Build a store over `bus`, starting from the deterministic seed so
    /// calls made before [`Store::init`] still operate on a valid tree.
    pub fn new(bus: EventBus, file: StateFile) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tree: RwLock::new(seed::seed_tree()),
                file,
                bus,
                reconciliation: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Load the durable local copy as the provisional tree, register the
    /// reconciliation handlers, and establish the Remote Link. Until the
    /// first authoritative snapshot arrives, reads serve the provisional
    /// tree: stale but available.
    pub fn init(&self) {
        if let Some(saved) = self.inner.file.load() {
            *self.inner.tree.write() = saved;
        }

        let weak = Arc::downgrade(&self.inner);
        let full_state = self.inner.bus.subscribe(
            topics::SERVER_FULL_STATE,
            move |_event, state, _origin| {
                if let Some(store) = Store::upgrade(&weak) {
                    store.apply_full_state(state);
                }
                Ok(())
            },
        );

        let weak = Arc::downgrade(&self.inner);
        let state_change = self.inner.bus.subscribe(
            topics::SERVER_STATE_CHANGE,
            move |_event, payload, _origin| {
                if let Some(store) = Store::upgrade(&weak) {
                    store.apply_server_change(payload);
                }
                Ok(())
            },
        );

        self.inner
            .reconciliation
            .lock()
            .extend([full_state, state_change]);

        self.inner.bus.connect();
    }

    fn upgrade(weak: &Weak<StoreInner>) -> Option<Store> {
        weak.upgrade().map(|inner| Store { inner })
    }

    /// The value at `path`, or `None` if any segment is missing.
    pub fn get(&self, path: &str) -> Option<Value> {
        path::get(&self.inner.tree.read(), path).cloned()
    }

    /// The whole tree.
    pub fn snapshot(&self) -> Value {
        self.inner.tree.read().clone()
    }

    /// Optimistic write: update the tree, persist, forward the mutation to
    /// the authority, and notify local listeners, all before returning.
    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut tree = self.inner.tree.write();
            path::set(&mut tree, path, value.clone())?;
        }
        self.persist();
        self.inner.bus.send_mutation(path, value.clone());
        self.inner.bus.publish(
            topics::STORE_CHANGED,
            json!({ "path": path, "value": value }),
            true,
        );
        Ok(())
    }

    /// Append `item` to the array at `path` (an absent value counts as an
    /// empty array) and write it back. Returns the appended item.
    pub fn push(&self, path: &str, item: Value) -> Result<Value, StoreError> {
        let mut items = self.array_at(path);
        items.push(item.clone());
        self.set(path, Value::Array(items))?;
        Ok(item)
    }

    /// Shallow-merge `patch` into the element whose `id` field equals `id`.
    /// Returns the updated element, or `None` (and no change) when no
    /// element matches.
    pub fn update_in_array(
        &self,
        path: &str,
        id: &str,
        patch: Value,
    ) -> Result<Option<Value>, StoreError> {
        let mut items = self.array_at(path);
        let Some(index) = items.iter().position(|item| has_id(item, id)) else {
            return Ok(None);
        };
        let updated = shallow_merge(&items[index], &patch);
        items[index] = updated.clone();
        self.set(path, Value::Array(items))?;
        Ok(Some(updated))
    }

    /// Write back the array at `path` without the matching element. Writes
    /// the unchanged array when nothing matches.
    pub fn remove_from_array(&self, path: &str, id: &str) -> Result<(), StoreError> {
        let remaining: Vec<Value> = self
            .array_at(path)
            .into_iter()
            .filter(|item| !has_id(item, id))
            .collect();
        self.set(path, Value::Array(remaining))
    }

    /// First element of the array at `path` whose `id` field equals `id`.
    pub fn find_by_id(&self, path: &str, id: &str) -> Option<Value> {
        self.array_at(path).into_iter().find(|item| has_id(item, id))
    }

    /// Replace the tree with the deterministic seed and persist it. Local
    /// recovery only; the authority is not notified.
    pub fn reset(&self) {
        *self.inner.tree.write() = seed::seed_tree();
        self.persist();
    }

    /// Reconcile against a complete authoritative snapshot: replace the
    /// tree, persist, and tell listeners everything may have changed.
    fn apply_full_state(&self, state: &Value) {
        tracing::info!("received full authoritative state");
        *self.inner.tree.write() = state.clone();
        self.persist();
        self.inner.bus.publish(
            topics::STORE_CHANGED,
            json!({ "path": "*", "value": null }),
            true,
        );
    }

    /// Reconcile one authoritative delta. Same observable effect as a local
    /// `set`, except the mutation is not forwarded back to the authority;
    /// it already originated there.
    fn apply_server_change(&self, payload: &Value) {
        let Some(path) = payload.get("path").and_then(Value::as_str) else {
            tracing::debug!("dropping state-change payload without a path");
            return;
        };
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        {
            let mut tree = self.inner.tree.write();
            if let Err(error) = path::set(&mut tree, path, value.clone()) {
                tracing::warn!(path, %error, "authoritative delta not applicable");
                return;
            }
        }
        self.persist();
        self.inner.bus.publish(
            topics::STORE_CHANGED,
            json!({ "path": path, "value": value }),
            true,
        );
    }

    fn array_at(&self, path: &str) -> Vec<Value> {
        self.get(path)
            .and_then(|value| value.as_array().cloned())
            .unwrap_or_default()
    }

    fn persist(&self) {
        self.inner.file.save(&self.inner.tree.read());
    }
}

fn has_id(item: &Value, id: &str) -> bool {
    item.get("id").and_then(Value::as_str) == Some(id)
}

/// Object-on-object merge keeps unpatched fields; any other combination
/// replaces the element wholesale.
fn shallow_merge(original: &Value, patch: &Value) -> Value {
    match (original, patch) {
        (Value::Object(base), Value::Object(updates)) => {
            let mut merged = base.clone();
            for (key, value) in updates {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}
