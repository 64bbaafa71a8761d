//! Realtime socket connection: Engine.IO/Socket.IO over a single WebSocket.
//!
//! LIFECYCLE
//! =========
//! 1. Dial `ws(s)://host/socket.io/?EIO=4&transport=websocket`
//! 2. Wait for the Engine.IO `open` packet
//! 3. Send Socket.IO `CONNECT` with `{ "token": ... }`, wait for the ack
//! 4. Spawn the socket loop: answer pings, forward events, write emits
//! 5. `disconnect()` or drop ends the loop and closes the socket
//!
//! Steps 1–3 share one deadline (the configured connect timeout). There is
//! no automatic reconnect; a token change means building a new connection.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use packets::{Event, Handshake, Packet, decode_packet, encode_packet};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect()` waits for the socket loop to finish closing.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle state of the realtime connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("cannot derive a socket url from {0:?}")]
    BadUrl(String),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("socket handshake timed out")]
    Timeout,
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("socket closed during handshake")]
    Closed,
    #[error("packet decode error: {0}")]
    Codec(#[from] packets::CodecError),
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectionError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

enum Command {
    Emit(Event),
    Disconnect,
}

/// Handle to a live socket. The socket loop runs on its own task and is
/// aborted when the handle is dropped.
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<Event>,
    status: watch::Receiver<ConnectionStatus>,
    handshake: Handshake,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    /// Dial the backend socket and authenticate with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] for a non-HTTP base URL, transport
    /// failures, a `CONNECT_ERROR` from the server, or a handshake that does
    /// not finish within the connect timeout.
    pub async fn connect(config: &ClientConfig, token: &str) -> Result<Self, ConnectionError> {
        let url = config.socket_url().ok_or_else(|| ConnectionError::BadUrl(config.base_url.clone()))?;
        let (status_tx, status) = watch::channel(ConnectionStatus::Connecting);

        info!(%url, "socket: connecting");
        let (stream, handshake, early) = tokio::time::timeout(config.timeouts.connect(), handshake(&url, token))
            .await
            .map_err(|_| ConnectionError::Timeout)??;
        info!(sid = %handshake.sid, "socket: connected");

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        for event in early {
            if event_tx.send(event).is_err() {
                break;
            }
        }
        status_tx.send_replace(ConnectionStatus::Connected);
        let task = tokio::spawn(run(stream, command_rx, event_tx, status_tx));

        Ok(Self { commands, events, status, handshake, task: Some(task) })
    }

    /// Queue an event for the server. Fire-and-forget: returns `false` only
    /// when the socket is already gone.
    pub fn emit(&self, event: Event) -> bool {
        if *self.status.borrow() == ConnectionStatus::Disconnected {
            debug!(event = %event.name, "socket: emit on closed connection");
            return false;
        }
        self.commands.send(Command::Emit(event)).is_ok()
    }

    /// Next server-pushed event, or `None` once the socket has closed and
    /// every buffered event was taken.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Send Socket.IO `DISCONNECT`, close the socket and wait briefly for the loop to end.
    pub async fn disconnect(&mut self) {
        if self.commands.send(Command::Disconnect).is_err() {
            debug!("socket: already closed");
        }
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                warn!("socket: close did not finish in time");
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Run steps 1–3 of the lifecycle. Events that arrive before the connect ack
/// are returned so they are not lost.
async fn handshake(url: &str, token: &str) -> Result<(WsStream, Handshake, Vec<Event>), ConnectionError> {
    let (mut stream, _) = connect_async(url).await?;

    let mut open = None;
    let mut early = Vec::new();
    loop {
        match next_packet(&mut stream).await? {
            Packet::Open(handshake) if open.is_none() => {
                debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "socket: engine open");
                send_packet(&mut stream, &Packet::Connect(Some(json!({ "token": token })))).await?;
                open = Some(handshake);
            }
            Packet::Ping => send_packet(&mut stream, &Packet::Pong).await?,
            Packet::Connect(_) => {
                if let Some(handshake) = open {
                    return Ok((stream, handshake, early));
                }
            }
            Packet::ConnectError(data) => return Err(ConnectionError::Rejected(rejection_message(&data))),
            Packet::Close | Packet::Disconnect => return Err(ConnectionError::Closed),
            Packet::Event(event) => early.push(event),
            other => debug!(?other, "socket: ignoring packet during handshake"),
        }
    }
}

fn rejection_message(data: &Value) -> String {
    data.get("message")
        .and_then(Value::as_str)
        .map_or_else(|| data.to_string(), str::to_owned)
}

/// Read until the next decodable text packet.
async fn next_packet(stream: &mut WsStream) -> Result<Packet, ConnectionError> {
    loop {
        let Some(msg) = stream.next().await else {
            return Err(ConnectionError::Closed);
        };
        match msg? {
            Message::Text(text) => return Ok(decode_packet(text.as_str())?),
            Message::Close(_) => return Err(ConnectionError::Closed),
            _ => {}
        }
    }
}

async fn send_packet(stream: &mut WsStream, packet: &Packet) -> Result<(), ConnectionError> {
    stream.send(Message::Text(encode_packet(packet).into())).await?;
    Ok(())
}

/// Step 4: the socket loop. Ends on close, transport error, disconnect, or
/// when the [`Connection`] handle goes away.
async fn run(
    mut stream: WsStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<Event>,
    status: watch::Sender<ConnectionStatus>,
) {
    loop {
        tokio::select! {
            msg = stream.next() => {
                let Some(msg) = msg else { break };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(error) => {
                        warn!(%error, "socket: transport error");
                        break;
                    }
                };
                match msg {
                    Message::Text(text) => match decode_packet(text.as_str()) {
                        Ok(Packet::Ping) => {
                            if send_packet(&mut stream, &Packet::Pong).await.is_err() {
                                break;
                            }
                        }
                        Ok(Packet::Event(event)) => {
                            debug!(event = %event.name, "socket: event");
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Ok(Packet::Close | Packet::Disconnect) => {
                            info!("socket: server closed the session");
                            break;
                        }
                        Ok(other) => debug!(?other, "socket: ignoring packet"),
                        Err(error) => warn!(%error, "socket: undecodable packet"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            command = commands.recv() => match command {
                Some(Command::Emit(event)) => {
                    debug!(event = %event.name, "socket: emit");
                    if let Err(error) = send_packet(&mut stream, &Packet::Event(event)).await {
                        warn!(%error, "socket: emit failed");
                        break;
                    }
                }
                Some(Command::Disconnect) | None => {
                    if let Err(error) = send_packet(&mut stream, &Packet::Disconnect).await {
                        debug!(%error, "socket: disconnect packet not sent");
                    }
                    if let Err(error) = stream.close(None).await {
                        debug!(%error, "socket: close failed");
                    }
                    break;
                }
            }
        }
    }
    status.send_replace(ConnectionStatus::Disconnected);
    info!("socket: disconnected");
}
