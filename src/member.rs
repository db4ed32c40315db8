//! Member struct definition
//!
//! Represents one joined participant: identity, display name and the room
//! it belongs to. Owned by the connection's read task.

use std::sync::Arc;

use tracing::info;

use crate::error::AppError;
use crate::hub::HubHandle;
use crate::message::ClientRequest;
use crate::outbox::OutboxSender;
use crate::room::{MemberHandle, Room};
use crate::types::{ConnectionId, MemberId, RoomId};

/// A participant that has been admitted to a room
#[derive(Debug)]
pub struct Member {
    id: MemberId,
    room_id: RoomId,
    display_name: String,
    connection: ConnectionId,
    room: Arc<Room>,
}

impl Member {
    /// Register with the hub and return the joined member
    ///
    /// `outbox` becomes the member's outbound queue; the room's join
    /// snapshot is already on it when this returns.
    pub async fn join(
        hub: &HubHandle,
        id: MemberId,
        room_id: RoomId,
        display_name: String,
        outbox: OutboxSender,
    ) -> Result<Self, AppError> {
        let handle = MemberHandle::new(display_name.clone(), outbox);
        let connection = handle.connection;
        let room = hub.join(room_id.clone(), id.clone(), handle).await?;

        Ok(Self {
            id,
            room_id,
            display_name,
            connection,
            room,
        })
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Token the hub checks before vacating this member's seat
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    /// Apply every field of one request, then broadcast once
    ///
    /// Fields are applied in a fixed order (name, title, vote, reset,
    /// reveal) under a single room lock, so a message carrying both
    /// `reset` and `reveal` ends revealed with an empty board.
    pub async fn handle_request(&mut self, request: &ClientRequest) {
        if let Some(name) = request.name() {
            self.display_name = name.to_string();
        }

        let id = &self.id;
        let display_name = self.display_name.as_str();
        let room_id = &self.room_id;

        self.room
            .update(|state| {
                if let Some(name) = request.name() {
                    state.rename(id, name);
                    info!("Member {} is now named '{}'", id, name);
                }
                if let Some(title) = request.title() {
                    state.set_title(title);
                    info!("Member {} set title of room {} to '{}'", id, room_id, title);
                }
                if let Some(vote) = request.vote() {
                    state.cast_vote(id, vote);
                    info!("Member {} ({}) voted: {}", id, display_name, vote);
                }
                if request.wants_reset() {
                    state.reset();
                    info!("Member {} reset room {}", id, room_id);
                }
                if request.wants_reveal() {
                    state.reveal(true);
                    info!("Member {} revealed room {}", id, room_id);
                }
            })
            .await;
    }
}
