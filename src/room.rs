//! Room state and broadcasting
//!
//! A `Room` wraps its `RoomState` in a per-room mutex. Every mutation goes
//! through `Room::update`, which applies the change and fans the resulting
//! snapshot out to all members before releasing the lock, so members see
//! snapshots in the same order the mutations happened.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

use crate::message::{MemberView, RoomSnapshot};
use crate::outbox::{Frame, OutboxSender};
use crate::types::{ConnectionId, MemberId, RoomId};

/// What a room keeps about each joined member
#[derive(Debug, Clone)]
pub struct MemberHandle {
    /// Display name shown in snapshots
    pub name: String,
    /// Member's outbound queue
    pub outbox: OutboxSender,
    /// Connection that owns this seat
    pub connection: ConnectionId,
}

impl MemberHandle {
    /// Handle for a fresh connection
    pub fn new(name: impl Into<String>, outbox: OutboxSender) -> Self {
        Self {
            name: name.into(),
            outbox,
            connection: ConnectionId::new(),
        }
    }
}

/// Voting state of one room
///
/// Only reachable through the room's lock.
#[derive(Debug)]
pub struct RoomState {
    id: RoomId,
    title: String,
    revealed: bool,
    members: HashMap<MemberId, MemberHandle>,
    votes: HashMap<MemberId, String>,
}

impl RoomState {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            title: String::new(),
            revealed: false,
            members: HashMap::new(),
            votes: HashMap::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn vote_of(&self, member_id: &MemberId) -> Option<&str> {
        self.votes.get(member_id).map(String::as_str)
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, member_id: &MemberId) -> bool {
        self.members.contains_key(member_id)
    }

    /// Connection currently holding `member_id`'s seat
    pub fn connection_of(&self, member_id: &MemberId) -> Option<ConnectionId> {
        self.members.get(member_id).map(|handle| handle.connection)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Last writer wins; an empty title reads as "no title"
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn cast_vote(&mut self, member_id: &MemberId, value: impl Into<String>) {
        self.votes.insert(member_id.clone(), value.into());
    }

    pub fn reveal(&mut self, flag: bool) {
        self.revealed = flag;
    }

    /// Start a new round
    pub fn reset(&mut self) {
        self.votes.clear();
        self.revealed = false;
    }

    /// Change a member's display name
    ///
    /// Returns false if the member is not in this room.
    pub fn rename(&mut self, member_id: &MemberId, name: impl Into<String>) -> bool {
        match self.members.get_mut(member_id) {
            Some(handle) => {
                handle.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Seat a member, replacing any earlier connection with the same id
    ///
    /// The replaced handle is dropped, which closes that connection's
    /// outbound queue.
    pub(crate) fn insert_member(&mut self, member_id: MemberId, handle: MemberHandle) {
        if let Some(previous) = self.members.insert(member_id.clone(), handle) {
            debug!(
                "Member {} in room {} taken over from connection {}",
                member_id, self.id, previous.connection
            );
        }
    }

    /// Remove a member together with its vote
    ///
    /// Only the connection holding the seat can vacate it; a stale
    /// connection whose seat was taken over removes nothing. Returns false
    /// if nothing was removed. Dropping the handle closes the member's
    /// outbound queue.
    pub(crate) fn remove_member(
        &mut self,
        member_id: &MemberId,
        connection: ConnectionId,
    ) -> bool {
        if self.connection_of(member_id) != Some(connection) {
            return false;
        }
        self.votes.remove(member_id);
        self.members.remove(member_id).is_some()
    }

    /// Deep copy of the current state
    pub fn snapshot(&self) -> RoomSnapshot {
        let mut members: Vec<MemberView> = self
            .members
            .iter()
            .map(|(id, handle)| MemberView {
                uuid: id.to_string(),
                name: handle.name.clone(),
            })
            .collect();
        members.sort_by(|a, b| a.uuid.cmp(&b.uuid));

        RoomSnapshot {
            reveal: self.revealed,
            title: self.title.clone(),
            members,
            votes: self
                .votes
                .iter()
                .map(|(id, vote)| (id.to_string(), vote.clone()))
                .collect(),
        }
    }

    /// Encode the current snapshot once and queue it for every member
    ///
    /// Returns the number of queues that accepted the frame.
    pub fn broadcast(&self) -> usize {
        let frame: Frame = match self.snapshot().encode() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to serialize state of room {}: {}", self.id, e);
                return 0;
            }
        };

        let delivered = self
            .members
            .values()
            .filter(|handle| handle.outbox.push(frame.clone()))
            .count();

        debug!(
            "Broadcast room {} to {}/{} member(s)",
            self.id,
            delivered,
            self.members.len()
        );
        delivered
    }
}

/// One voting room
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
}

impl Room {
    /// Create an empty, unrevealed room without a title
    pub fn new(id: RoomId) -> Self {
        Self {
            state: Mutex::new(RoomState::new(id.clone())),
            id,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Lock the state without broadcasting afterwards
    pub(crate) async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Apply a change atomically, then broadcast the result
    ///
    /// Exactly one snapshot is sent per call, even if `f` changes nothing.
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut RoomState) -> R,
    {
        let mut state = self.state.lock().await;
        let result = f(&mut *state);
        state.broadcast();
        result
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.update(|state| state.set_title(title)).await
    }

    pub async fn cast_vote(&self, member_id: &MemberId, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.cast_vote(member_id, value)).await
    }

    pub async fn reveal(&self, flag: bool) {
        self.update(|state| state.reveal(flag)).await
    }

    pub async fn reset(&self) {
        self.update(RoomState::reset).await
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        self.state.lock().await.snapshot()
    }
}
