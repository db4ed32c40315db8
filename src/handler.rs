//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake with
//! parameter validation, then the read and write loops of one member.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use crate::config::{Config, IdentityMode};
use crate::error::{AppError, Rejection};
use crate::hub::HubHandle;
use crate::member::Member;
use crate::message::ClientRequest;
use crate::outbox::outbox;
use crate::types::{MemberId, RoomId};

/// How long the write task may take to flush and close after leaving
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// What a valid upgrade request carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinParams {
    pub member_id: MemberId,
    pub room_id: RoomId,
    pub name: String,
}

impl JoinParams {
    /// Validate the upgrade request's path and query string
    pub fn from_request(request: &Request, config: &Config) -> Result<Self, Rejection> {
        let path = request.uri().path();
        if path != config.path {
            return Err(Rejection::UnknownPath(path.to_string()));
        }

        let mut room = None;
        let mut name = None;
        let mut uuid = None;
        let query = request.uri().query().unwrap_or_default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "room" => room = Some(value.into_owned()),
                "name" => name = Some(value.into_owned()),
                "uuid" => uuid = Some(value.into_owned()),
                _ => {}
            }
        }

        let (Some(room), Some(name)) = (room, name) else {
            return Err(Rejection::MissingParameters);
        };
        if room.is_empty() || name.is_empty() {
            return Err(Rejection::MissingParameters);
        }

        let member_id = match (config.identity, uuid) {
            (IdentityMode::ClientSupplied, Some(uuid)) if !uuid.is_empty() => {
                MemberId::from_string(uuid)
            }
            _ => MemberId::generate(),
        };

        Ok(Self {
            member_id,
            room_id: RoomId::from_string(room),
            name,
        })
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, joins the hub, runs both loops until
/// either ends, and leaves the hub exactly once.
pub async fn handle_connection(
    stream: TcpStream,
    hub: HubHandle,
    config: Arc<Config>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake; the callback decides before anything reaches the hub
    let mut outcome = None;
    let callback = |request: &Request, response: Response| {
        let parsed = JoinParams::from_request(request, &config);
        let result = match &parsed {
            Ok(_) => Ok(response),
            Err(rejection) => Err(rejection.to_response()),
        };
        outcome = Some(parsed);
        result
    };
    let handshake = tokio_tungstenite::accept_hdr_async(stream, callback).await;

    let (ws_stream, params) = match (handshake, outcome) {
        (Ok(ws_stream), Some(Ok(params))) => (ws_stream, params),
        (_, Some(Err(rejection))) => {
            warn!("Rejected connection from {}: {}", peer_addr, rejection);
            return Err(rejection.into());
        }
        (Err(e), _) => return Err(e.into()),
        (Ok(_), None) => return Err(Rejection::MissingParameters.into()),
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Server -> client queue, then register with the hub
    let (outbox_tx, mut outbox_rx) = outbox(config.outbound_capacity);
    let mut member = Member::join(
        &hub,
        params.member_id,
        params.room_id,
        params.name,
        outbox_tx,
    )
    .await?;

    let member_id = member.id().clone();
    let room_id = member.room_id().clone();
    let connection = member.connection();
    info!(
        "Member {} ({}) connected from {} to room {}",
        member_id,
        member.display_name(),
        peer_addr,
        room_id
    );

    // Spawn read task (WebSocket -> Room)
    let read_id = member_id.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match ClientRequest::decode(&text) {
                    Ok(request) => member.handle_request(&request).await,
                    Err(e) => {
                        warn!("Invalid message format from {}: {}", read_id, e);
                    }
                },
                Ok(Message::Binary(data)) => match ClientRequest::decode_bytes(&data) {
                    Ok(request) => member.handle_request(&request).await,
                    Err(e) => {
                        warn!("Invalid binary message from {}: {}", read_id, e);
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Member {} sent close frame", read_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong replies are handled by tungstenite
                }
                Ok(Message::Frame(_)) => {
                    // Raw frames are never yielded while reading
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", read_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", read_id);
    });

    // Spawn write task (outbox -> WebSocket)
    let write_id = member_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(frame.to_string().into())).await {
                debug!("WebSocket send to {} failed: {}", write_id, e);
                break;
            }
        }
        debug!("Write task ended for {}", write_id);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Whichever side finishes first ends the connection
    let write_done = tokio::select! {
        _ = &mut read_task => false,
        _ = &mut write_task => {
            read_task.abort();
            true
        }
    };

    if let Err(e) = hub.leave(room_id, member_id.clone(), connection).await {
        debug!("Could not leave hub for {}: {}", member_id, e);
    }

    // Leaving drops the room's sender, so the write task drains and sends
    // its close frame
    if !write_done && tokio::time::timeout(CLOSE_GRACE, &mut write_task).await.is_err() {
        debug!("Write task for {} did not close in time", member_id);
        write_task.abort();
    }

    info!("Member {} disconnected", member_id);

    Ok(())
}
