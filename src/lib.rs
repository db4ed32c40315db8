//! Planning Poker Hub Library
//!
//! A WebSocket server for real-time estimation sessions built with
//! tokio-tungstenite. Participants join a room by name, vote, reveal and
//! reset, and every change is pushed to everyone in the room as a full
//! snapshot of its state.
//!
//! # Architecture
//! - `Hub` is an actor owning the room registry: join, leave and lookups
//!   are commands on its channel
//! - Each `Room` guards its own state with a mutex and broadcasts after
//!   every mutation while still holding it
//! - Each connection owns a `Member` and runs a read task and a write task;
//!   the write task drains a bounded drop-oldest `outbox`
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use poker_hub::{serve, Config, Hub};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(Config::default());
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     let hub = Hub::spawn(config.hub_channel_capacity);
//!     serve(listener, hub, config).await;
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod member;
pub mod message;
pub mod outbox;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::{Config, IdentityMode};
pub use error::{AppError, ConfigError, Rejection};
pub use handler::{handle_connection, JoinParams};
pub use hub::{Hub, HubCommand, HubHandle};
pub use member::Member;
pub use message::{ClientRequest, MemberView, RoomSnapshot};
pub use outbox::{outbox, OutboxReceiver, OutboxSender};
pub use room::{MemberHandle, Room, RoomState};
pub use server::serve;
pub use types::{ConnectionId, MemberId, RoomId};
