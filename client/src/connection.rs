//! Connection lifecycle management for the session client
//!
//! [`ConnectionManager`] owns the transport connection: it generates the
//! local player identity, dials the coordinator, sends the join request on
//! every successful connection (the same identity is re-sent after a drop so
//! the coordinator can restore membership), and applies a bounded backoff
//! schedule to failed attempts. The connection itself lives on a background
//! task; the manager is a handle that surfaces [`SessionEvent`]s and accepts
//! fire-and-forget outbound events.

use crate::config::ClientConfig;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{decode_payload, encode_frame, frame_len, ClientEvent, ServerEvent, FRAME_HEADER_BYTES};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Joined,
    /// The coordinator refused the join request; terminal until a new
    /// connection is made.
    Rejected,
    /// The coordinator removed this player; terminal until a new connection
    /// is made.
    Kicked,
    Disconnected,
}

/// Events surfaced to the application loop: coordinator events plus
/// transport notifications from the connection task.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A coordinator event arrived on the wire.
    Server(ServerEvent),
    /// The transport opened and the join request was sent.
    Joined,
    /// The transport reconnected and the join request was re-sent with the
    /// original identity.
    Rejoined,
    /// A dial attempt failed or an established connection dropped; the
    /// connection task keeps retrying in the background.
    ConnectError { message: String },
    /// The bounded attempt count is spent; no further retries are made.
    RetriesExhausted,
    /// The connection task released the transport and exited.
    Closed,
}

#[derive(Debug)]
pub(crate) enum Command {
    Send(ClientEvent),
    Shutdown,
}

/// Clonable fire-and-forget handle for outbound client events.
///
/// Events are queued onto the connection task. If the connection is gone the
/// event is dropped silently; segment loss on disconnect is accepted and not
/// recovered.
#[derive(Debug, Clone)]
pub struct EventSender {
    commands: mpsc::UnboundedSender<Command>,
}

impl EventSender {
    pub fn send(&self, event: ClientEvent) {
        if self.commands.send(Command::Send(event)).is_err() {
            debug!("Dropped outbound event: connection closed");
        }
    }
}

#[cfg(test)]
pub(crate) fn command_channel() -> (EventSender, mpsc::UnboundedReceiver<Command>) {
    let (commands, receiver) = mpsc::unbounded_channel();
    (EventSender { commands }, receiver)
}

pub struct ConnectionManager {
    state: ConnectionState,
    player_id: String,
    nickname: String,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Opens a connection to the coordinator and arms rejoin-on-reconnect.
    ///
    /// A fresh player id is generated for every call; it stays stable for
    /// the lifetime of this manager, including across reconnects.
    pub fn connect(config: ClientConfig, nickname: &str) -> Self {
        let player_id = Uuid::new_v4().to_string();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        info!("Connecting as {} ({})", nickname, player_id);
        let task = tokio::spawn(transport_loop(
            config,
            player_id.clone(),
            nickname.to_string(),
            command_rx,
            event_tx,
        ));

        ConnectionManager {
            state: ConnectionState::Connecting,
            player_id,
            nickname: nickname.to_string(),
            events: event_rx,
            commands: command_tx,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            commands: self.commands.clone(),
        }
    }

    /// Next session event, in arrival order. Returns `None` once the
    /// connection task has exited and all buffered events were drained.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events.recv().await?;
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Joined | SessionEvent::Rejoined => {
                self.state = ConnectionState::Joined;
            }
            SessionEvent::ConnectError { .. } => {
                self.state = ConnectionState::Connecting;
            }
            SessionEvent::RetriesExhausted => {
                self.state = ConnectionState::Disconnected;
            }
            SessionEvent::Server(ServerEvent::JoinRejected { .. }) => {
                self.state = ConnectionState::Rejected;
            }
            SessionEvent::Server(ServerEvent::Kicked) => {
                self.state = ConnectionState::Kicked;
            }
            SessionEvent::Closed => {
                if !matches!(
                    self.state,
                    ConnectionState::Rejected | ConnectionState::Kicked
                ) {
                    self.state = ConnectionState::Disconnected;
                }
            }
            SessionEvent::Server(_) => {}
        }
    }

    /// Asks the connection task to close the transport. Safe to call any
    /// number of times; once the task is gone this is a no-op.
    pub fn disconnect(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Joined
        ) {
            self.state = ConnectionState::Idle;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Reads one length-prefixed event frame from the stream.
pub async fn read_event<R, T>(reader: &mut R) -> io::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; FRAME_HEADER_BYTES];
    reader.read_exact(&mut header).await?;

    let len = frame_len(header)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame exceeds size limit"))?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    decode_payload(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes one length-prefixed event frame to the stream.
pub async fn write_event<W, T>(writer: &mut W, event: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

enum Dial {
    Connected(TcpStream),
    Failed(String),
    Shutdown,
}

enum SessionEnd {
    /// Rejected, kicked, or locally shut down; the task must not reconnect.
    Terminal,
    /// The connection dropped; the task should reconnect and rejoin.
    Dropped,
}

async fn transport_loop(
    config: ClientConfig,
    player_id: String,
    nickname: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let addr = match config.server_addr.clone() {
        Some(addr) => addr,
        None => {
            warn!(
                "No coordinator endpoint configured (set {})",
                crate::config::ENDPOINT_ENV_VAR
            );
            let _ = events.send(SessionEvent::ConnectError {
                message: "no coordinator endpoint configured".to_string(),
            });
            let _ = events.send(SessionEvent::RetriesExhausted);
            let _ = events.send(SessionEvent::Closed);
            return;
        }
    };

    let mut attempts: u32 = 0;
    let mut had_session = false;

    loop {
        match dial(&config, &addr, &mut commands).await {
            Dial::Connected(stream) => {
                attempts = 0;
                let (reader, mut writer) = stream.into_split();

                let join = ClientEvent::JoinLobby {
                    player_id: player_id.clone(),
                    nickname: nickname.clone(),
                };
                if let Err(e) = write_event(&mut writer, &join).await {
                    warn!("Failed to send join request: {}", e);
                    let _ = events.send(SessionEvent::ConnectError {
                        message: e.to_string(),
                    });
                } else {
                    if had_session {
                        info!("Reconnected; rejoined lobby as {}", player_id);
                        let _ = events.send(SessionEvent::Rejoined);
                    } else {
                        info!("Connected; joined lobby as {}", player_id);
                        let _ = events.send(SessionEvent::Joined);
                    }
                    had_session = true;

                    match run_session(reader, &mut writer, &mut commands, &events).await {
                        SessionEnd::Terminal => {
                            let _ = events.send(SessionEvent::Closed);
                            return;
                        }
                        SessionEnd::Dropped => {
                            warn!("Connection to coordinator lost");
                            let _ = events.send(SessionEvent::ConnectError {
                                message: "connection lost".to_string(),
                            });
                        }
                    }

                    // A drop is not a failed dial: retry from the base delay.
                    if !sleep_or_shutdown(&mut commands, config.reconnect_delay).await {
                        let _ = events.send(SessionEvent::Closed);
                        return;
                    }
                    continue;
                }
            }
            Dial::Shutdown => {
                let _ = events.send(SessionEvent::Closed);
                return;
            }
            Dial::Failed(message) => {
                debug!("Connection attempt failed: {}", message);
                let _ = events.send(SessionEvent::ConnectError { message });
            }
        }

        attempts += 1;
        if attempts >= config.max_connect_attempts {
            error!("Giving up after {} failed connection attempts", attempts);
            let _ = events.send(SessionEvent::RetriesExhausted);
            let _ = events.send(SessionEvent::Closed);
            return;
        }

        let delay = config.backoff_delay(attempts);
        debug!("Retrying connection in {:?} (attempt {})", delay, attempts + 1);
        if !sleep_or_shutdown(&mut commands, delay).await {
            let _ = events.send(SessionEvent::Closed);
            return;
        }
    }
}

async fn dial(
    config: &ClientConfig,
    addr: &str,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Dial {
    let connect = timeout(config.connect_timeout, TcpStream::connect(addr));
    tokio::pin!(connect);

    loop {
        tokio::select! {
            result = &mut connect => {
                return match result {
                    Ok(Ok(stream)) => Dial::Connected(stream),
                    Ok(Err(e)) => Dial::Failed(e.to_string()),
                    Err(_) => Dial::Failed(format!(
                        "connection timed out after {:?}",
                        config.connect_timeout
                    )),
                };
            }
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => return Dial::Shutdown,
                // Not connected yet: outbound events are dropped.
                Some(Command::Send(_)) => {}
            },
        }
    }
}

/// Sleeps for `delay`, returning false if a shutdown request arrives first.
/// Outbound events arriving while offline are drained and dropped.
async fn sleep_or_shutdown(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    delay: Duration,
) -> bool {
    let wait = sleep(delay);
    tokio::pin!(wait);

    loop {
        tokio::select! {
            _ = &mut wait => return true,
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => return false,
                Some(Command::Send(_)) => {}
            },
        }
    }
}

async fn run_session(
    reader: OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> SessionEnd {
    // Reads happen on their own task so a mid-frame read is never cancelled
    // by outbound traffic.
    let mut read_task = tokio::spawn(read_loop(reader, events.clone()));

    loop {
        tokio::select! {
            end = &mut read_task => {
                return end.unwrap_or(SessionEnd::Dropped);
            }
            command = commands.recv() => match command {
                Some(Command::Send(event)) => {
                    if let Err(e) = write_event(writer, &event).await {
                        warn!("Failed to send event: {}", e);
                        read_task.abort();
                        return SessionEnd::Dropped;
                    }
                }
                Some(Command::Shutdown) | None => {
                    read_task.abort();
                    return SessionEnd::Terminal;
                }
            },
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> SessionEnd {
    loop {
        match read_event::<_, ServerEvent>(&mut reader).await {
            Ok(event) => {
                let terminal = matches!(
                    event,
                    ServerEvent::JoinRejected { .. } | ServerEvent::Kicked
                );
                let _ = events.send(SessionEvent::Server(event));
                if terminal {
                    // Stop reading immediately: frames buffered behind a
                    // terminal event must never be processed.
                    return SessionEnd::Terminal;
                }
            }
            Err(e) => {
                debug!("Coordinator stream closed: {}", e);
                return SessionEnd::Dropped;
            }
        }
    }
}
