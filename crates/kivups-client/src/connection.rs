//! The connection manager: one socket, one session, one exchange at a time.
//!
//! Everything that touches the socket goes through an [`Exchange`], a
//! guard over the connection's async mutex. Holding it for the whole of
//! a request/response round trip (including any pings the server slips
//! in between) is what keeps the foreground command path and a
//! background page listener from interleaving on the wire.
//!
//! Responsibilities:
//!   1. Open, close and reopen the transport (bounded retry with backoff)
//!   2. Cut the byte stream into frames and decode them
//!   3. Validate every inbound header against the session
//!   4. Answer `ServerPingPlayer` so callers never see a ping
//!   5. Tear down (close + reset the state machine) on fatal errors

use std::sync::Arc;

use kivups_protocol::{
    registry, Codec, CommandId, Message, Nickname, Param, ProtocolError, TextCodec, Trigger,
};
use kivups_session::{SessionError, SessionState, StateMachine};
use kivups_transport::{Connection, Connector, TransportError};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::outcome::{Outcome, RESUME_COMMANDS, Resume};
use crate::{ClientConfig, ClientError, FrameBuffer};

/// How long a read may wait for the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Wait up to the read timeout; running out of time is a transport
    /// error.
    Block,
    /// Wait up to the poll interval; running out of time returns nothing,
    /// unless the link has been silent for longer than the read timeout.
    Poll,
    /// Only hand out frames that are already buffered.
    Buffered,
}

/// Everything guarded by the exchange lock.
struct Link<C> {
    conn: Option<C>,
    frames: FrameBuffer,
    nickname: Option<Nickname>,
    address: Option<String>,
    /// Set once a login (or reconnect) succeeded; decides whether a lost
    /// connection is worth recovering.
    logged_in: bool,
    last_inbound: Instant,
}

/// Owns the transport and the session state for one player.
pub struct ConnectionManager<K: Connector> {
    connector: K,
    config: ClientConfig,
    codec: TextCodec,
    machine: Arc<StateMachine>,
    link: Mutex<Link<K::Connection>>,
}

impl<K> ConnectionManager<K>
where
    K: Connector<Error = TransportError>,
{
    pub fn new(connector: K, config: ClientConfig) -> Self {
        let config = config.validated();
        Self {
            connector,
            codec: TextCodec,
            machine: Arc::new(StateMachine::new()),
            link: Mutex::new(Link {
                conn: None,
                frames: FrameBuffer::new(config.max_frame_size),
                nickname: None,
                address: None,
                logged_in: false,
                last_inbound: Instant::now(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The session state machine shared with every exchange.
    pub fn machine(&self) -> &Arc<StateMachine> {
        &self.machine
    }

    /// Takes the exchange lock. Waits while another exchange is running.
    pub async fn exchange(&self) -> Exchange<'_, K> {
        Exchange {
            manager: self,
            link: self.link.lock().await,
        }
    }

    /// Returns `true` while a transport handle is open.
    pub async fn is_open(&self) -> bool {
        self.link.lock().await.conn.is_some()
    }
}

/// Exclusive access to the connection for one round trip.
pub struct Exchange<'a, K: Connector> {
    manager: &'a ConnectionManager<K>,
    link: MutexGuard<'a, Link<K::Connection>>,
}

impl<K> Exchange<'_, K>
where
    K: Connector<Error = TransportError>,
{
    pub fn state(&self) -> SessionState {
        self.manager.machine.current()
    }

    pub fn is_open(&self) -> bool {
        self.link.conn.is_some()
    }

    pub fn nickname(&self) -> Option<&Nickname> {
        self.link.nickname.as_ref()
    }

    /// Returns `true` if the last session on `address` logged in as
    /// `nickname` and was never logged out.
    pub(crate) fn was_logged_in_as(&self, address: &str, nickname: &Nickname) -> bool {
        self.link.logged_in
            && self.link.address.as_deref() == Some(address)
            && self.link.nickname.as_ref() == Some(nickname)
    }

    pub(crate) fn set_logged_in(&mut self, logged_in: bool) {
        self.link.logged_in = logged_in;
    }

    /// Drops the session identity, so the next login starts fresh.
    pub(crate) fn forget_session(&mut self) {
        self.link.logged_in = false;
        self.link.nickname = None;
        self.link.address = None;
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Opens a fresh connection to `address` for `nickname`, closing any
    /// connection that is still open.
    pub async fn open(&mut self, address: &str, nickname: Nickname) -> Result<(), ClientError> {
        if self.link.conn.is_some() {
            self.teardown().await;
        }
        self.link.address = Some(address.to_string());
        self.link.nickname = Some(nickname);

        let conn = self.manager.connector.connect(address).await?;
        self.install(conn);
        Ok(())
    }

    fn install(&mut self, conn: K::Connection) {
        tracing::info!(id = %conn.id(), "connected to server");
        self.link.conn = Some(conn);
        self.link.frames.clear();
        self.link.last_inbound = Instant::now();
    }

    /// Closes the transport, drops buffered bytes and resets the session
    /// state machine. Safe to call when already closed.
    pub async fn teardown(&mut self) {
        if let Some(conn) = self.link.conn.take() {
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "error while closing connection");
            }
            tracing::info!(id = %conn.id(), "connection closed");
        }
        self.link.frames.clear();
        self.manager.machine.reset();
    }

    // -----------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------

    /// Encodes and writes one frame.
    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        let bytes = self
            .manager
            .codec
            .encode(message)
            .map_err(ClientError::InvalidRequest)?;
        let conn = self.link.conn.as_ref().ok_or(ClientError::NotConnected)?;
        conn.send(&bytes).await?;
        tracing::debug!(command = %message.command, len = bytes.len(), "frame sent");
        Ok(())
    }

    /// Acknowledges `msg` with `ResponseClientSuccess`, echoing its
    /// timestamp so the server can match the ack to what it sent.
    pub async fn acknowledge(&mut self, msg: &Message) -> Result<(), ClientError> {
        let nickname = self.link.nickname.clone().ok_or(ClientError::NotConnected)?;
        let ack = Message::with_timestamp(
            CommandId::RESPONSE_CLIENT_SUCCESS,
            nickname,
            msg.timestamp.clone(),
            Vec::new(),
        );
        self.send(&ack).await
    }

    // -----------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------

    /// Returns the next validated, non-ping message.
    ///
    /// Pings are answered and their trigger fired on the way. `Ok(None)`
    /// only happens in [`ReadMode::Poll`] and [`ReadMode::Buffered`].
    pub async fn next_message(&mut self, mode: ReadMode) -> Result<Option<Message>, ClientError> {
        loop {
            let Some(frame) = self.next_frame(mode).await? else {
                return Ok(None);
            };
            let msg = self.decode(&frame)?;
            if msg.command == CommandId::SERVER_PING_PLAYER {
                self.acknowledge(&msg).await?;
                self.fire_inbound(&msg, Trigger::ServerPingPlayer)?;
                tracing::trace!(timestamp = %msg.timestamp, "ping answered");
                continue;
            }
            return Ok(Some(msg));
        }
    }

    async fn next_frame(&mut self, mode: ReadMode) -> Result<Option<Vec<u8>>, ClientError> {
        let read_timeout = self.manager.config.read_timeout;
        loop {
            if let Some(frame) = self.link.frames.next_frame()? {
                return Ok(Some(frame));
            }
            let wait = match mode {
                ReadMode::Buffered => return Ok(None),
                ReadMode::Block => read_timeout,
                ReadMode::Poll => self.manager.config.poll_interval,
            };
            let conn = self.link.conn.as_ref().ok_or(ClientError::NotConnected)?;

            match tokio::time::timeout(wait, conn.recv()).await {
                Ok(Ok(Some(bytes))) => {
                    self.link.frames.extend(&bytes);
                    self.link.last_inbound = Instant::now();
                }
                Ok(Ok(None)) => {
                    return Err(TransportError::ConnectionClosed(
                        "server closed the connection".into(),
                    )
                    .into());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) if mode == ReadMode::Poll
                    && self.link.last_inbound.elapsed() < read_timeout =>
                {
                    return Ok(None);
                }
                Err(_) => return Err(TransportError::TimedOut(read_timeout).into()),
            }
        }
    }

    /// Decodes a frame and checks that it belongs to this session.
    fn decode(&self, frame: &[u8]) -> Result<Message, ClientError> {
        let msg = self.manager.codec.decode(frame)?;
        if let Some(expected) = &self.link.nickname {
            if msg.nickname != *expected {
                return Err(ProtocolError::InvalidField {
                    field: "nickname".into(),
                    reason: format!("expected {expected}, got {}", msg.nickname),
                }
                .into());
            }
        }
        tracing::debug!(command = %msg.command, "frame received");
        Ok(msg)
    }

    /// Fires `trigger` for an inbound message. Failing here means the
    /// server and the client disagree about the session, which is fatal.
    pub(crate) fn fire_inbound(&self, msg: &Message, trigger: Trigger) -> Result<(), ClientError> {
        self.manager
            .machine
            .fire(trigger)
            .map(|_| ())
            .map_err(|SessionError::InvalidTransition { state, .. }| {
                ClientError::UnexpectedCommand {
                    command: msg.command,
                    state,
                }
            })
    }

    // -----------------------------------------------------------------
    // Request / response
    // -----------------------------------------------------------------

    /// Sends `command` and waits for its response.
    ///
    /// On success both the command's trigger and the response's trigger
    /// have been fired, in that order. A `ResponseServerError` comes back
    /// as [`ClientError::ServerReported`] with the state untouched.
    pub(crate) async fn request(
        &mut self,
        command: CommandId,
        params: Vec<Param>,
        accepted: &[CommandId],
    ) -> Result<Message, ClientError> {
        let descriptor = registry::lookup(command).map_err(ClientError::InvalidRequest)?;
        descriptor
            .check_params(&params)
            .map_err(ClientError::InvalidRequest)?;
        if let Some(trigger) = descriptor.trigger {
            let state = self.state();
            if !state.allows(trigger) {
                return Err(SessionError::InvalidTransition { state, trigger }.into());
            }
        }
        let nickname = self.link.nickname.clone().ok_or(ClientError::NotConnected)?;

        self.send(&Message::new(command, nickname, params)).await?;

        let response = self
            .next_message(ReadMode::Block)
            .await?
            .ok_or(TransportError::TimedOut(self.manager.config.read_timeout))?;

        if response.command == CommandId::RESPONSE_SERVER_ERROR {
            let reason = response.scalar("message").unwrap_or_default().to_string();
            tracing::warn!(%command, %reason, "server rejected request");
            return Err(ClientError::ServerReported(reason));
        }
        if !accepted.contains(&response.command) {
            return Err(ClientError::UnexpectedCommand {
                command: response.command,
                state: self.state(),
            });
        }

        if let Some(trigger) = descriptor.trigger {
            self.fire_inbound(&response, trigger)?;
        }
        if let Some(trigger) = registry::trigger(response.command)? {
            self.fire_inbound(&response, trigger)?;
        }
        Ok(response)
    }

    /// The reconnect handshake on an already open connection.
    pub(crate) async fn resume(&mut self) -> Result<Resume, ClientError> {
        let response = self
            .request(CommandId::CLIENT_RECONNECT, Vec::new(), &RESUME_COMMANDS)
            .await?;
        let resume = Resume::from_message(&response)?;
        self.link.logged_in = true;
        Ok(resume)
    }

    // -----------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------

    /// Turns an exchange result into what the UI gets back.
    ///
    /// - transport failure: tear down, then (if `recover` and the player
    ///   was logged in) run the reconnect policy
    /// - fatal format/state failure: tear down and return the error
    /// - anything else: return the error, connection stays as it is
    pub(crate) async fn settle<T>(
        &mut self,
        result: Result<T, ClientError>,
        recover: bool,
    ) -> Result<Outcome<T>, ClientError> {
        match result {
            Ok(value) => Ok(Outcome::Connected(value)),
            Err(ClientError::Transport(e)) => {
                tracing::warn!(error = %e, "connection lost");
                self.teardown().await;
                if !(recover && self.link.logged_in) {
                    return Ok(Outcome::Disconnected);
                }
                Ok(match self.reopen().await {
                    Some(resume) => Outcome::Resumed(resume),
                    None => Outcome::Disconnected,
                })
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "closing connection");
                self.teardown().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Tries to get the session back on a new connection.
    ///
    /// Makes up to `reconnect_attempts` attempts, each preceded by the
    /// backoff pause. An attempt is a connect plus the reconnect
    /// handshake. Returns `None` when every attempt failed or the server
    /// would not resume; the player then has to log in again.
    pub(crate) async fn reopen(&mut self) -> Option<Resume> {
        let address = self.link.address.clone()?;
        let attempts = self.manager.config.reconnect_attempts;
        let backoff = self.manager.config.reconnect_backoff;

        for attempt in 1..=attempts {
            tokio::time::sleep(backoff).await;
            tracing::info!(attempt, attempts, %address, "reconnecting");

            let conn = match self.manager.connector.connect(&address).await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "reconnect attempt failed");
                    continue;
                }
            };
            self.install(conn);

            match self.resume().await {
                Ok(resume) => {
                    tracing::info!(attempt, state = %self.state(), "session resumed");
                    return Some(resume);
                }
                Err(ClientError::Transport(e)) => {
                    tracing::warn!(attempt, error = %e, "connection lost during reconnect");
                    self.teardown().await;
                }
                Err(ClientError::ServerReported(reason)) => {
                    tracing::warn!(%reason, "server refused to resume the session");
                    self.teardown().await;
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "reconnect handshake failed");
                    self.teardown().await;
                    break;
                }
            }
        }

        tracing::warn!(attempts, "giving up on reconnect");
        self.link.logged_in = false;
        None
    }
}
