//! Newline-delimited JSON transport over TCP.
//!
//! Each line a client sends is one request, tagged by `type`:
//!
//! ```text
//! {"type":"create","name":"lobby","width":10,"height":10,"playerLimit":3}
//! {"type":"join","game":"lobby","user":"ann","color":"red"}
//! {"type":"watch","game":"lobby"}
//! {"type":"start","game":"lobby"}
//! {"type":"place","game":"lobby","position":[4,2]}
//! {"type":"leave","game":"lobby"}
//! {"type":"presence","game":"lobby"}
//! {"type":"state","game":"lobby"}
//! ```
//!
//! Every request gets exactly one reply line, `{"ok":true,"result":...}` or
//! `{"ok":false,"code":"...","message":"..."}`. Room events of joined or
//! watched games are written on the same connection as
//! `{"event":"...","data":{...}}` lines.

use crate::board::Position;
use crate::color::Color;
use crate::coordinator::{ClientHandle, SessionCoordinator};
use crate::error::{ErrorCode, ErrorResponse, GameError};
use crate::events::RoomEvent;
use crate::session::UserRef;
use crate::store::{GameStore, NewGame};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Longest request line accepted, newline excluded.
pub const MAX_REQUEST_LINE: usize = 64 * 1024;

/// One request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    Create {
        name: String,
        width: usize,
        height: usize,
        #[serde(default)]
        player_limit: Option<usize>,
    },
    Join {
        game: String,
        user: String,
        #[serde(default)]
        color: Option<Color>,
    },
    Watch {
        game: String,
    },
    Leave {
        game: String,
    },
    Start {
        game: String,
    },
    Place {
        game: String,
        position: Position,
    },
    Presence {
        game: String,
    },
    State {
        game: String,
    },
}

/// One reply line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerReply {
    pub fn success(result: Value) -> Self {
        ServerReply {
            ok: true,
            result: Some(result),
            code: None,
            message: None,
        }
    }

    pub fn failure(error: ErrorResponse) -> Self {
        ServerReply {
            ok: false,
            result: None,
            code: Some(error.code),
            message: Some(error.message),
        }
    }
}

/// Accepts connections until the listener fails.
pub async fn serve<S: GameStore>(
    listener: TcpListener,
    coordinator: Arc<SessionCoordinator<S>>,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, coordinator).await {
                warn!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}

/// Per-connection state: who this client is in each game and which rooms it
/// is forwarding events from.
struct Connection<S: GameStore> {
    coordinator: Arc<SessionCoordinator<S>>,
    handle: ClientHandle<S>,
    users: HashMap<String, UserRef>,
    forwarders: HashMap<String, JoinHandle<()>>,
    outgoing: mpsc::UnboundedSender<String>,
}

async fn handle_connection<S: GameStore>(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<SessionCoordinator<S>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let (outgoing, mut lines) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        while let Some(mut line) = lines.recv().await {
            line.push('\n');
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let handle = coordinator.connect();
    info!(%peer, client = handle.id(), "client connected");
    let mut connection = Connection {
        coordinator,
        handle,
        users: HashMap::new(),
        forwarders: HashMap::new(),
        outgoing,
    };

    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let result = loop {
        line.clear();
        let limit = MAX_REQUEST_LINE as u64 + 1;
        match (&mut reader).take(limit).read_until(b'\n', &mut line).await {
            Ok(0) => break Ok(()),
            Ok(_) => {
                let reply = if line.len() > MAX_REQUEST_LINE && line.last() != Some(&b'\n') {
                    warn!(%peer, client = connection.handle.id(), "request line too long");
                    if let Err(e) = discard_line(&mut reader).await {
                        break Err(e);
                    }
                    ServerReply::failure(ErrorResponse {
                        code: ErrorCode::ValidationError,
                        message: format!("request line longer than {} bytes", MAX_REQUEST_LINE),
                    })
                } else if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                } else {
                    match serde_json::from_slice::<ClientRequest>(&line) {
                        Ok(request) => {
                            debug!(client = connection.handle.id(), ?request, "request");
                            match connection.dispatch(request).await {
                                Ok(result) => ServerReply::success(result),
                                Err(err) => ServerReply::failure(ErrorResponse::from(&err)),
                            }
                        }
                        Err(e) => ServerReply::failure(ErrorResponse {
                            code: ErrorCode::ValidationError,
                            message: format!("malformed request: {}", e),
                        }),
                    }
                };
                let encoded = serde_json::to_string(&reply).map_err(std::io::Error::other)?;
                if connection.outgoing.send(encoded).is_err() {
                    break Ok(());
                }
            }
            Err(e) => break Err(e),
        }
    };

    info!(%peer, client = connection.handle.id(), "client disconnected");
    connection.close();
    let _ = writer_task.await;
    result
}

impl<S: GameStore> Connection<S> {
    async fn dispatch(&mut self, request: ClientRequest) -> Result<Value, GameError> {
        let coordinator = self.coordinator.clone();
        match request {
            ClientRequest::Create {
                name,
                width,
                height,
                player_limit,
            } => {
                let record = coordinator
                    .create_game(NewGame {
                        name,
                        width,
                        height,
                        player_limit: player_limit.unwrap_or(coordinator.default_player_limit()),
                    })
                    .await?;
                to_value(&record)
            }
            ClientRequest::Join { game, user, color } => {
                self.subscribe(&game).await?;
                let user = UserRef::new(user);
                let ack = coordinator
                    .join(self.handle.id(), &game, user.clone(), color)
                    .await?;
                self.users.insert(game, user);
                to_value(&ack)
            }
            ClientRequest::Watch { game } => {
                self.subscribe(&game).await?;
                Ok(json!({ "game": game }))
            }
            ClientRequest::Leave { game } => {
                let user = self.user_in(&game)?;
                let player = coordinator.leave(&game, &user).await?;
                self.users.remove(&game);
                to_value(&player)
            }
            ClientRequest::Start { game } => {
                coordinator.start(&game).await?;
                Ok(json!({ "game": game }))
            }
            ClientRequest::Place { game, position } => {
                let user = self.user_in(&game)?;
                let ack = coordinator.place_marble(&game, &user, position).await?;
                to_value(&ack)
            }
            ClientRequest::Presence { game } => {
                let presence = coordinator.player_presence(&game).await?;
                to_value(&presence)
            }
            ClientRequest::State { game } => {
                let record = coordinator.snapshot(&game).await?;
                let current_turn = coordinator.current_turn(&game).await?;
                Ok(json!({
                    "game": record,
                    "currentTurn": current_turn,
                    "degraded": coordinator.is_degraded(&game),
                }))
            }
        }
    }

    fn user_in(&self, game: &str) -> Result<UserRef, GameError> {
        self.users
            .get(game)
            .cloned()
            .ok_or_else(|| GameError::validation(format!("not joined to game '{}'", game)))
    }

    /// Starts forwarding `game`'s room events to this connection.
    async fn subscribe(&mut self, game: &str) -> Result<(), GameError> {
        if self.forwarders.contains_key(game) {
            return Ok(());
        }
        let receiver = self.coordinator.watch(self.handle.id(), game).await?;
        let task = tokio::spawn(forward_events(receiver, self.outgoing.clone()));
        self.forwarders.insert(game.to_string(), task);
        Ok(())
    }

    fn close(self) {
        for (_, task) in self.forwarders {
            task.abort();
        }
        // Dropping the handle releases the client's seats.
        drop(self.handle);
    }
}

/// Skips the rest of an oversized line without buffering it.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(end) = buf.iter().position(|&b| b == b'\n') {
            reader.consume(end + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}

async fn forward_events(
    mut receiver: broadcast::Receiver<RoomEvent>,
    outgoing: mpsc::UnboundedSender<String>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let Ok(line) = serde_json::to_string(&event) else {
                    continue;
                };
                if outgoing.send(line).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "watcher fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, GameError> {
    serde_json::to_value(value).map_err(|e| GameError::validation(e.to_string()))
}
