//! Wire protocol between a client and the authoritative server.
//!
//! Every frame is a JSON object discriminated by a `type` tag. Both
//! directions are modeled as tagged enums so inbound dispatch is exhaustive;
//! an unknown or undecodable frame is dropped at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent from this client to the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Optimistic state mutation at a dot-delimited path.
    #[serde(rename = "SET")]
    Set { path: String, value: Value },
    /// Domain event relayed to other devices through the authority.
    #[serde(rename = "EVENT")]
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
    /// Order creation, handled server-side as a single atomic mutation.
    #[serde(rename = "CREATE_ORDER")]
    CreateOrder { order: Value },
}

/// Frames sent from the authority to this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Complete authoritative state tree, sent at minimum on connect.
    #[serde(rename = "FULL_STATE")]
    FullState { state: Value },
    /// Incremental authoritative mutation.
    #[serde(rename = "STATE_CHANGE")]
    StateChange { path: String, value: Value },
    /// Domain event originated by another client, relayed by the authority.
    #[serde(rename = "EVENT")]
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("client message serializes to JSON")
    }
}

impl ServerMessage {
    /// Decode an inbound frame, dropping anything malformed.
    pub fn decode(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(message) => Some(message),
            Err(error) => {
                tracing::debug!(%error, "dropping undecodable server frame");
                None
            }
        }
    }
}
