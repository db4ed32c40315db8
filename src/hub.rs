//! Hub actor implementation
//!
//! The central actor owning the room registry. Joining, leaving and room
//! lookups all go through its command channel, so the map of rooms is only
//! ever touched by one task. Room contents are guarded separately by each
//! room's own lock; the hub holds one of those only long enough to insert
//! or remove a member.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::AppError;
use crate::room::{MemberHandle, Room};
use crate::types::{ConnectionId, MemberId, RoomId};

/// Commands sent from connections to the Hub actor
#[derive(Debug)]
pub enum HubCommand {
    /// Add a member to a room, creating the room if needed
    Join {
        room_id: RoomId,
        member_id: MemberId,
        handle: MemberHandle,
        reply: oneshot::Sender<Arc<Room>>,
    },
    /// Remove a member from its room, if `connection` still holds the seat
    Leave {
        room_id: RoomId,
        member_id: MemberId,
        connection: ConnectionId,
    },
    /// Fetch a live room
    Lookup {
        room_id: RoomId,
        reply: oneshot::Sender<Option<Arc<Room>>>,
    },
    /// Number of live rooms
    RoomCount { reply: oneshot::Sender<usize> },
}

/// The Hub actor
pub struct Hub {
    /// All live rooms: RoomId -> Room
    rooms: HashMap<RoomId, Arc<Room>>,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Create a new Hub with the given command receiver
    pub fn new(receiver: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            rooms: HashMap::new(),
            receiver,
        }
    }

    /// Start a Hub on the current runtime and return a handle to it
    pub fn spawn(capacity: usize) -> HubHandle {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(Hub::new(receiver).run());
        HubHandle::new(sender)
    }

    /// Run the Hub event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Hub shutting down");
    }

    async fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Join {
                room_id,
                member_id,
                handle,
                reply,
            } => {
                let room = self.handle_join(room_id, member_id, handle).await;
                let _ = reply.send(room);
            }
            HubCommand::Leave {
                room_id,
                member_id,
                connection,
            } => {
                self.handle_leave(room_id, member_id, connection).await;
            }
            HubCommand::Lookup { room_id, reply } => {
                let _ = reply.send(self.rooms.get(&room_id).cloned());
            }
            HubCommand::RoomCount { reply } => {
                let _ = reply.send(self.rooms.len());
            }
        }
    }

    async fn handle_join(
        &mut self,
        room_id: RoomId,
        member_id: MemberId,
        handle: MemberHandle,
    ) -> Arc<Room> {
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Room {} created", room_id);
                Arc::new(Room::new(room_id.clone()))
            })
            .clone();

        info!("Member {} ({}) joined room {}", member_id, handle.name, room_id);

        let mut state = room.lock().await;
        state.insert_member(member_id, handle);
        state.broadcast();
        drop(state);

        debug!("Total rooms: {}", self.rooms.len());
        room
    }

    async fn handle_leave(
        &mut self,
        room_id: RoomId,
        member_id: MemberId,
        connection: ConnectionId,
    ) {
        let Some(room) = self.rooms.get(&room_id).cloned() else {
            debug!("Leave for {} ignored, room {} already gone", member_id, room_id);
            return;
        };

        let mut state = room.lock().await;
        if !state.remove_member(&member_id, connection) {
            debug!(
                "Leave for {} from connection {} ignored, seat not held",
                member_id, connection
            );
            return;
        }
        info!("Member {} left room {}", member_id, room_id);

        if state.is_empty() {
            drop(state);
            self.rooms.remove(&room_id);
            info!("Room {} deleted (empty)", room_id);
        } else {
            state.broadcast();
        }

        debug!("Total rooms: {}", self.rooms.len());
    }
}

/// Cloneable sending side of the Hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub fn new(sender: mpsc::Sender<HubCommand>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HubCommand,
    ) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| AppError::HubClosed)?;
        response.await.map_err(|_| AppError::HubClosed)
    }

    /// Join `room_id`, returning the room the member now belongs to
    ///
    /// The room broadcasts its new state before this returns.
    pub async fn join(
        &self,
        room_id: RoomId,
        member_id: MemberId,
        handle: MemberHandle,
    ) -> Result<Arc<Room>, AppError> {
        self.request(|reply| HubCommand::Join {
            room_id,
            member_id,
            handle,
            reply,
        })
        .await
    }

    /// Remove a member; a no-op if the member or its room is already gone,
    /// or if another connection has since taken the member's seat
    pub async fn leave(
        &self,
        room_id: RoomId,
        member_id: MemberId,
        connection: ConnectionId,
    ) -> Result<(), AppError> {
        self.sender
            .send(HubCommand::Leave {
                room_id,
                member_id,
                connection,
            })
            .await
            .map_err(|_| AppError::HubClosed)
    }

    pub async fn lookup(&self, room_id: RoomId) -> Result<Option<Arc<Room>>, AppError> {
        self.request(|reply| HubCommand::Lookup { room_id, reply })
            .await
    }

    pub async fn room_count(&self) -> Result<usize, AppError> {
        self.request(|reply| HubCommand::RoomCount { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::RoomSnapshot;
    use crate::outbox::{outbox, OutboxReceiver};

    fn room(id: &str) -> RoomId {
        RoomId::from_string(id.to_string())
    }

    async fn join(
        hub: &HubHandle,
        room_id: &str,
        name: &str,
    ) -> (MemberId, Arc<Room>, OutboxReceiver) {
        join_as(hub, room_id, MemberId::generate(), name).await
    }

    async fn join_as(
        hub: &HubHandle,
        room_id: &str,
        id: MemberId,
        name: &str,
    ) -> (MemberId, Arc<Room>, OutboxReceiver) {
        let (tx, rx) = outbox(64);
        let room = hub
            .join(room(room_id), id.clone(), MemberHandle::new(name, tx))
            .await
            .unwrap();
        (id, room, rx)
    }

    async fn connection(room: &Room, id: &MemberId) -> ConnectionId {
        room.lock().await.connection_of(id).unwrap()
    }

    async fn next_snapshot(rx: &mut OutboxReceiver) -> RoomSnapshot {
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for snapshot")
            .expect("outbox closed");
        serde_json::from_str(&frame).unwrap()
    }

    async fn assert_silent(rx: &mut OutboxReceiver) {
        let next = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(next.is_err(), "unexpected snapshot");
    }

    #[tokio::test]
    async fn test_join_creates_room() {
        let hub = Hub::spawn(16);
        let (alice, room, mut rx) = join(&hub, "r1", "Alice").await;

        let snapshot = next_snapshot(&mut rx).await;
        assert!(!snapshot.reveal);
        assert_eq!(snapshot.title, "");
        assert!(snapshot.votes.is_empty());
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.members[0].uuid, alice.to_string());
        assert_eq!(snapshot.members[0].name, "Alice");

        assert_eq!(room.id().as_str(), "r1");
        assert_eq!(hub.room_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_join_reuses_room() {
        let hub = Hub::spawn(16);
        let (alice, first, mut rx1) = join(&hub, "r1", "Alice").await;
        first.set_title("Story").await;
        first.cast_vote(&alice, "3").await;

        let (_bob, second, _rx2) = join(&hub, "r1", "Bob").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hub.room_count().await.unwrap(), 1);

        // join, title, vote, then Bob's join
        let mut last = next_snapshot(&mut rx1).await;
        for _ in 0..3 {
            last = next_snapshot(&mut rx1).await;
        }
        assert_eq!(last.title, "Story");
        assert_eq!(last.votes.len(), 1);
        assert_eq!(last.members.len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_stays_in_room() {
        let hub = Hub::spawn(16);
        let (_a, room_r, mut rx_a) = join(&hub, "r", "A").await;
        let (_b, _, mut rx_b) = join(&hub, "r", "B").await;
        let (_c, _, mut rx_c) = join(&hub, "r", "C").await;
        let (_x, _, mut rx_x) = join(&hub, "other", "X").await;

        // drain join snapshots
        for _ in 0..3 {
            next_snapshot(&mut rx_a).await;
        }
        for _ in 0..2 {
            next_snapshot(&mut rx_b).await;
        }
        next_snapshot(&mut rx_c).await;
        next_snapshot(&mut rx_x).await;

        room_r.reveal(true).await;

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let snapshot = next_snapshot(rx).await;
            assert!(snapshot.reveal);
            assert_eq!(snapshot.members.len(), 3);
        }
        assert_silent(&mut rx_x).await;
    }

    #[tokio::test]
    async fn test_leave_removes_vote() {
        let hub = Hub::spawn(16);
        let (alice, room_r, _rx_a) = join(&hub, "r1", "Alice").await;
        let (bob, _, mut rx_b) = join(&hub, "r1", "Bob").await;
        room_r.cast_vote(&alice, "5").await;
        room_r.cast_vote(&bob, "8").await;

        let seat = connection(&room_r, &alice).await;
        hub.leave(room("r1"), alice.clone(), seat).await.unwrap();

        let mut snapshot = next_snapshot(&mut rx_b).await;
        while snapshot.members.len() != 1 {
            snapshot = next_snapshot(&mut rx_b).await;
        }
        assert!(!snapshot.votes.contains_key(alice.as_str()));
        assert_eq!(snapshot.votes.get(bob.as_str()).map(String::as_str), Some("8"));
    }

    #[tokio::test]
    async fn test_last_leave_destroys_room() {
        let hub = Hub::spawn(16);
        let (alice, room_r, _rx) = join(&hub, "r1", "Alice").await;
        room_r.set_title("Old").await;
        room_r.cast_vote(&alice, "1").await;
        room_r.reveal(true).await;

        let seat = connection(&room_r, &alice).await;
        hub.leave(room("r1"), alice, seat).await.unwrap();

        assert!(hub.lookup(room("r1")).await.unwrap().is_none());
        assert_eq!(hub.room_count().await.unwrap(), 0);

        let (_bob, fresh, mut rx) = join(&hub, "r1", "Bob").await;
        assert!(!Arc::ptr_eq(&room_r, &fresh));
        let snapshot = next_snapshot(&mut rx).await;
        assert_eq!(snapshot.title, "");
        assert!(!snapshot.reveal);
        assert!(snapshot.votes.is_empty());
        assert_eq!(snapshot.members.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_closes_outbox() {
        let hub = Hub::spawn(16);
        let (alice, room_r, mut rx) = join(&hub, "r1", "Alice").await;
        next_snapshot(&mut rx).await;

        let seat = connection(&room_r, &alice).await;
        hub.leave(room("r1"), alice, seat).await.unwrap();

        let end = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let hub = Hub::spawn(16);
        let (alice, room_r, _rx_a) = join(&hub, "r1", "Alice").await;
        let (_bob, _, _rx_b) = join(&hub, "r1", "Bob").await;
        let seat = connection(&room_r, &alice).await;

        hub.leave(room("r1"), alice.clone(), seat).await.unwrap();
        hub.leave(room("r1"), alice.clone(), seat).await.unwrap();
        hub.leave(room("missing"), alice, seat).await.unwrap();

        let live = hub.lookup(room("r1")).await.unwrap().unwrap();
        assert_eq!(live.snapshot().await.members.len(), 1);
    }

    #[tokio::test]
    async fn test_takeover_survives_stale_leave() {
        let hub = Hub::spawn(16);
        let shared = MemberId::from_string("same".to_string());
        let (_, room_r, mut old_rx) = join_as(&hub, "r1", shared.clone(), "Old").await;
        let old_seat = connection(&room_r, &shared).await;
        let (_, _, mut new_rx) = join_as(&hub, "r1", shared.clone(), "New").await;
        next_snapshot(&mut new_rx).await;

        // The replaced connection's queue is closed once drained
        while old_rx.recv().await.is_some() {}

        hub.leave(room("r1"), shared.clone(), old_seat).await.unwrap();
        room_r.cast_vote(&shared, "5").await;

        let live = hub.lookup(room("r1")).await.unwrap().expect("room destroyed");
        assert!(Arc::ptr_eq(&live, &room_r));
        let snapshot = next_snapshot(&mut new_rx).await;
        assert_eq!(snapshot.members.len(), 1);
        assert_eq!(snapshot.members[0].name, "New");
        assert_eq!(snapshot.votes.get("same").map(String::as_str), Some("5"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_are_all_kept() {
        const MEMBERS: usize = 32;

        let hub = Hub::spawn(64);
        let mut members = Vec::new();
        for i in 0..MEMBERS {
            members.push(join(&hub, "r1", &format!("m{i}")).await);
        }

        let tasks: Vec<_> = members
            .iter()
            .enumerate()
            .map(|(i, (id, room, _rx))| {
                let id = id.clone();
                let room = room.clone();
                tokio::spawn(async move { room.cast_vote(&id, i.to_string()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = members[0].1.snapshot().await;
        assert_eq!(snapshot.votes.len(), MEMBERS);
        for (i, (id, _, _)) in members.iter().enumerate() {
            assert_eq!(snapshot.votes.get(id.as_str()), Some(&i.to_string()));
        }
    }

    #[tokio::test]
    async fn test_closed_hub() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let hub = HubHandle::new(sender);

        let err = hub.room_count().await.unwrap_err();
        assert!(matches!(err, AppError::HubClosed));
    }
}
