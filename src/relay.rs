//! Room relay
//!
//! The server side of the chat: accepts sockets at
//! `/ws/<room>?username=<name>`, announces joins and leaves, replays a
//! room's history to whoever joins, and broadcasts every chat line to all
//! members of the room, sender included. History lives in memory only.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri};

use crate::error::{ChatError, Result};
use crate::protocol::{InboundFrame, OutboundMessage};

static NEXT_MEMBER_ID: AtomicU64 = AtomicU64::new(1);

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A chat line kept in a room's history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredMessage {
    pub username: String,
    pub content: String,
    pub timestamp: String,
}

struct Member {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct RoomState {
    members: Vec<Member>,
    history: Vec<StoredMessage>,
}

impl RoomState {
    fn broadcast(&self, frame: &InboundFrame) {
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize frame: {}", e);
                return;
            }
        };
        for member in &self.members {
            // A closed channel means the member is leaving; its own task
            // removes it.
            let _ = member.tx.send(json.clone());
        }
    }
}

#[derive(Clone, Default)]
struct Rooms(Arc<Mutex<HashMap<String, RoomState>>>);

impl Rooms {
    fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&mut RoomState) -> R) -> R {
        let mut rooms = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(rooms.entry(room_id.to_string()).or_default())
    }

    fn history(&self, room_id: &str) -> Vec<StoredMessage> {
        let rooms = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .get(room_id)
            .map(|room| room.history.clone())
            .unwrap_or_default()
    }

    fn member_count(&self, room_id: &str) -> usize {
        let rooms = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.get(room_id).map(|room| room.members.len()).unwrap_or(0)
    }

    /// Register a member, announce it to the room (itself included) and
    /// queue the room's history for it. Both happen under the room lock, so
    /// no later post can overtake the replay.
    fn join(&self, room_id: &str, member: Member, username: &str) {
        self.with_room(room_id, |room| {
            let tx = member.tx.clone();
            room.members.push(member);
            room.broadcast(&InboundFrame::system(
                format!("⭐ {} joined the room", username),
                now(),
            ));
            for stored in &room.history {
                let frame = InboundFrame::user(
                    stored.username.clone(),
                    stored.content.clone(),
                    stored.timestamp.clone(),
                );
                match frame.to_json() {
                    Ok(json) => {
                        let _ = tx.send(json);
                    }
                    Err(e) => log::error!("Failed to serialize history frame: {}", e),
                }
            }
        });
    }

    fn post(&self, room_id: &str, message: OutboundMessage) {
        self.with_room(room_id, |room| {
            let stored = StoredMessage {
                username: message.username,
                content: message.content,
                timestamp: now(),
            };
            room.broadcast(&InboundFrame::user(
                stored.username.clone(),
                stored.content.clone(),
                stored.timestamp.clone(),
            ));
            room.history.push(stored);
        });
    }

    fn leave(&self, room_id: &str, member_id: u64, username: &str) {
        self.with_room(room_id, |room| {
            room.members.retain(|m| m.id != member_id);
            room.broadcast(&InboundFrame::system(
                format!("❌ {} left the room", username),
                now(),
            ));
        });
    }
}

fn now() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

/// A bound relay, ready to [`run`](Relay::run).
pub struct Relay {
    listener: TcpListener,
    rooms: Rooms,
}

impl Relay {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            rooms: Rooms::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the process exits.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => log::info!("[Relay] Listening on {}", addr),
            Err(e) => log::warn!("[Relay] Listening on unknown address: {}", e),
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("[Relay] Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            log::debug!("[Relay] Incoming TCP connection from {}", peer);

            let rooms = self.rooms.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, rooms).await {
                    log::warn!("[Relay] Connection from {} ended: {}", peer, e);
                }
            });
        }
    }

    /// Bind and run on a dedicated thread with its own tokio runtime.
    pub fn spawn(addr: &str) -> Result<RelayHandle> {
        let addr = addr.to_string();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(ChatError::Io(e)));
                    return;
                }
            };

            rt.block_on(async move {
                match Relay::bind(&addr).await {
                    Ok(relay) => {
                        let ready = relay.local_addr().map(|a| (a, relay.rooms.clone()));
                        let _ = ready_tx.send(ready);
                        relay.run().await;
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            });
        });

        let (addr, rooms) = ready_rx
            .recv()
            .map_err(|_| ChatError::Io(std::io::Error::other("relay thread exited")))??;
        Ok(RelayHandle { addr, rooms })
    }
}

/// A relay running on its own thread.
pub struct RelayHandle {
    addr: SocketAddr,
    rooms: Rooms,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn history(&self, room_id: &str) -> Vec<StoredMessage> {
        self.rooms.history(room_id)
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.member_count(room_id)
    }
}

/// Room id and username from an upgrade request target.
fn parse_target(uri: &Uri) -> std::result::Result<(String, String), &'static str> {
    let room_id = uri
        .path()
        .strip_prefix("/ws/")
        .filter(|room| !room.contains('/'))
        .ok_or("expected /ws/<room_id>")?;

    let username = uri
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "username")
                .map(|(_, value)| value.into_owned())
        })
        .ok_or("missing username")?;

    Ok((room_id.to_string(), username))
}

fn bad_request(reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, rooms: Rooms) -> Result<()> {
    let mut target = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        match parse_target(req.uri()) {
            Ok(parsed) => {
                target = Some(parsed);
                Ok(resp)
            }
            Err(reason) => {
                log::warn!("[Relay] Rejecting {} ({}): {}", peer, req.uri(), reason);
                Err(bad_request(reason))
            }
        }
    })
    .await?;

    let Some((room_id, username)) = target else {
        return Ok(());
    };
    log::info!("[Relay {}] {} joined from {}", room_id, username, peer);

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let member_id = NEXT_MEMBER_ID.fetch_add(1, Ordering::SeqCst);

    rooms.join(&room_id, Member { id: member_id, tx }, &username);

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if write.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<OutboundMessage>(&text) {
                Ok(message) => {
                    log::debug!("[Relay {}] {}: {}", room_id, message.username, message.content);
                    rooms.post(&room_id, message);
                }
                Err(e) => log::warn!("[Relay {}] Ignoring malformed frame: {}", room_id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("[Relay {}] Read error from {}: {}", room_id, username, e);
                break;
            }
        }
    }

    rooms.leave(&room_id, member_id, &username);
    writer.abort();
    log::info!("[Relay {}] {} left", room_id, username);
    Ok(())
}
