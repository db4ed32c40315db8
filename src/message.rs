//! Message protocol definitions
//!
//! JSON in both directions. Requests are flat objects whose fields are all
//! optional; snapshots are full renderings of one room's state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Client → Server request
///
/// Any combination of fields may be present in one message. Empty strings
/// and `null` count as "not provided"; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientRequest {
    pub title: Option<String>,
    pub name: Option<String>,
    pub vote: Option<String>,
    pub reset: Option<bool>,
    pub reveal: Option<bool>,
}

impl ClientRequest {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Decode one binary frame holding UTF-8 JSON
    pub fn decode_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn title(&self) -> Option<&str> {
        non_empty(&self.title)
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    pub fn vote(&self) -> Option<&str> {
        non_empty(&self.vote)
    }

    pub fn wants_reset(&self) -> bool {
        self.reset.unwrap_or(false)
    }

    /// There is no way to un-reveal except a reset
    pub fn wants_reveal(&self) -> bool {
        self.reveal.unwrap_or(false)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// One joined member as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub uuid: String,
    pub name: String,
}

/// Server → Client room state
///
/// Owns all of its data, so it stays valid after the room changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub reveal: bool,
    pub title: String,
    pub members: Vec<MemberView>,
    pub votes: BTreeMap<String, String>,
}

impl RoomSnapshot {
    /// Encode for the wire
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
