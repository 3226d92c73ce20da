//! `Dispatcher` builder and the command calls the UI makes.
//!
//! Every call follows the same shape: stop any background listener, take
//! the exchange lock, run one request/response round trip, then settle
//! the result (reconnect on transport loss, tear down on fatal errors).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kivups_protocol::{
    model, CommandId, CubeRoll, GameSummary, Message, Nickname, Param, ProtocolError, Trigger,
};
use kivups_session::{SessionError, SessionState};
use kivups_transport::{Connector, TcpConnector, TransportError};

use crate::connection::ConnectionManager;
use crate::listen::{Flow, ListenExit, ListenTask, Page};
use crate::outcome::{self, Outcome, Resume, RollResult, SelectionResult};
use crate::{ClientConfig, ClientError};

/// Builder for configuring a [`Dispatcher`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use kivups_client::prelude::*;
///
/// # async fn run() -> Result<(), ClientError> {
/// let client = Dispatcher::builder()
///     .read_timeout(Duration::from_secs(5))
///     .reconnect_attempts(3)
///     .build();
///
/// if let Outcome::Connected(games) = client.login(DEFAULT_SERVER_ADDR, "Alice123").await? {
///     println!("{} games open", games.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DispatcherBuilder {
    config: ClientConfig,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.config.reconnect_backoff = backoff;
        self
    }

    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Builds a dispatcher that talks plain TCP.
    pub fn build(self) -> Dispatcher<TcpConnector> {
        let connector = TcpConnector::new().with_chunk_size(self.config.read_chunk_size);
        Dispatcher::new(connector, self.config)
    }

    /// Builds a dispatcher on a custom connector.
    pub fn build_with<K>(self, connector: K) -> Dispatcher<K>
    where
        K: Connector<Error = TransportError>,
    {
        Dispatcher::new(connector, self.config)
    }
}

/// The client's single entry point: one player, one server connection.
///
/// Share it as `Arc<Dispatcher>` between the UI and whatever drives the
/// pages. Calls are serialized on the connection; a call made while a page
/// listens stops the listener first.
pub struct Dispatcher<K: Connector = TcpConnector> {
    manager: Arc<ConnectionManager<K>>,
    listener: Mutex<Option<ListenTask>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }
}

impl<K> Dispatcher<K>
where
    K: Connector<Error = TransportError>,
{
    pub fn new(connector: K, config: ClientConfig) -> Self {
        Self {
            manager: Arc::new(ConnectionManager::new(connector, config)),
            listener: Mutex::new(None),
        }
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        self.manager.machine().current()
    }

    pub fn config(&self) -> &ClientConfig {
        self.manager.config()
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.is_open().await
    }

    // -----------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------

    /// Connects to `address` and logs in as `nickname`.
    ///
    /// If the same nickname was logged in on the same server when the
    /// connection was lost, this asks the server to resume that session
    /// instead, and a successful resume comes back as
    /// [`Outcome::Resumed`]. A server that no longer knows the session
    /// gets a fresh login.
    pub async fn login(
        &self,
        address: &str,
        nickname: &str,
    ) -> Result<Outcome<Vec<GameSummary>>, ClientError> {
        let nickname = Nickname::parse(nickname).map_err(ClientError::InvalidRequest)?;
        self.stop_listening().await;

        let mut ex = self.manager.exchange().await;
        let state = ex.state();
        if state != SessionState::Start {
            return Err(SessionError::InvalidTransition {
                state,
                trigger: Trigger::ClientLogin,
            }
            .into());
        }

        let resuming = ex.was_logged_in_as(address, &nickname);
        tracing::info!(%nickname, %address, resuming, "logging in");
        if let Err(e) = ex.open(address, nickname).await {
            return ex.settle(Err(e), false).await;
        }

        if resuming {
            match ex.resume().await {
                Err(ClientError::ServerReported(reason)) => {
                    tracing::info!(%reason, "session not resumable, logging in fresh");
                    ex.set_logged_in(false);
                }
                result => {
                    return Ok(match ex.settle(result, false).await? {
                        Outcome::Connected(resume) | Outcome::Resumed(resume) => {
                            Outcome::Resumed(resume)
                        }
                        Outcome::Disconnected => Outcome::Disconnected,
                    });
                }
            }
        }

        let result = ex
            .request(
                CommandId::CLIENT_LOGIN,
                Vec::new(),
                &[CommandId::RESPONSE_SERVER_GAME_LIST],
            )
            .await
            .and_then(|response| outcome::games(&response));
        if result.is_ok() {
            ex.set_logged_in(true);
        }
        ex.settle(result, false).await
    }

    /// Logs out and closes the connection.
    pub async fn logout(&self) -> Result<Outcome<()>, ClientError> {
        self.stop_listening().await;
        let mut ex = self.manager.exchange().await;
        if !ex.is_open() {
            return Err(ClientError::NotConnected);
        }

        let result = ex
            .request(
                CommandId::CLIENT_LOGOUT,
                Vec::new(),
                &[CommandId::RESPONSE_SERVER_SUCCESS],
            )
            .await
            .map(|_| ());
        let done = matches!(result, Ok(()) | Err(ClientError::Transport(_)));
        if done {
            ex.forget_session();
        }
        let outcome = ex.settle(result, false).await?;
        if done {
            ex.teardown().await;
            tracing::info!("logged out");
        }
        Ok(outcome)
    }

    /// Drops the current connection and runs the reconnect policy.
    ///
    /// Returns [`Outcome::Disconnected`] (not an error) once every attempt
    /// failed.
    pub async fn reconnect(&self) -> Result<Outcome<Resume>, ClientError> {
        self.stop_listening().await;
        let mut ex = self.manager.exchange().await;
        if ex.nickname().is_none() {
            return Err(ClientError::NotConnected);
        }
        ex.teardown().await;
        Ok(match ex.reopen().await {
            Some(resume) => Outcome::Connected(resume),
            None => Outcome::Disconnected,
        })
    }

    /// Closes the connection without telling the server.
    pub async fn close(&self) {
        self.stop_listening().await;
        self.manager.exchange().await.teardown().await;
    }

    // -----------------------------------------------------------------
    // Lobby and game
    // -----------------------------------------------------------------

    pub async fn create_game(
        &self,
        name: &str,
        max_players: u32,
    ) -> Result<Outcome<()>, ClientError> {
        if name.is_empty() {
            return Err(invalid("gameName", "must not be empty"));
        }
        if max_players == 0 {
            return Err(invalid("maxPlayers", "must be at least 1"));
        }
        let params = vec![
            Param::scalar("gameName", name),
            Param::scalar("maxPlayers", max_players.to_string()),
        ];
        self.call(
            CommandId::CLIENT_CREATE_GAME,
            params,
            &[CommandId::RESPONSE_SERVER_SUCCESS],
            |_| Ok(()),
        )
        .await
    }

    pub async fn join_game(&self, name: &str) -> Result<Outcome<()>, ClientError> {
        if name.is_empty() {
            return Err(invalid("gameName", "must not be empty"));
        }
        let params = vec![Param::scalar("gameName", name)];
        self.call(
            CommandId::CLIENT_JOIN_GAME,
            params,
            &[CommandId::RESPONSE_SERVER_SUCCESS],
            |_| Ok(()),
        )
        .await
    }

    pub async fn start_game(&self) -> Result<Outcome<()>, ClientError> {
        self.call(
            CommandId::CLIENT_START_GAME,
            Vec::new(),
            &[CommandId::RESPONSE_SERVER_SUCCESS],
            |_| Ok(()),
        )
        .await
    }

    /// Rolls the dice. Only valid on our turn.
    pub async fn roll_dice(&self) -> Result<Outcome<RollResult>, ClientError> {
        self.call(
            CommandId::CLIENT_ROLL_DICE,
            Vec::new(),
            &[
                CommandId::RESPONSE_SERVER_SELECT_CUBES,
                CommandId::RESPONSE_SERVER_END_TURN,
            ],
            |response| match response.command {
                CommandId::RESPONSE_SERVER_SELECT_CUBES => {
                    Ok(RollResult::Rolled(outcome::cubes(response)?))
                }
                _ => Ok(RollResult::TurnOver),
            },
        )
        .await
    }

    /// Keeps `cubes` from the last roll.
    pub async fn select_cubes(
        &self,
        cubes: &[CubeRoll],
    ) -> Result<Outcome<SelectionResult>, ClientError> {
        if cubes.is_empty() {
            return Err(invalid("cubeValues", "select at least one cube"));
        }
        let params = vec![model::to_param("cubeValues", cubes)];
        self.call(
            CommandId::CLIENT_SELECTED_CUBES,
            params,
            &[
                CommandId::RESPONSE_SERVER_DICE_SUCCESS,
                CommandId::RESPONSE_SERVER_END_SCORE,
            ],
            |response| match response.command {
                CommandId::RESPONSE_SERVER_END_SCORE => Ok(SelectionResult::GameOver),
                _ => Ok(SelectionResult::Continue),
            },
        )
        .await
    }

    /// Banks the score and passes the turn.
    pub async fn end_turn(&self) -> Result<Outcome<()>, ClientError> {
        self.call(
            CommandId::CLIENT_END_TURN,
            Vec::new(),
            &[CommandId::RESPONSE_SERVER_SUCCESS],
            |_| Ok(()),
        )
        .await
    }

    async fn call<T>(
        &self,
        command: CommandId,
        params: Vec<Param>,
        accepted: &[CommandId],
        convert: impl FnOnce(&Message) -> Result<T, ClientError>,
    ) -> Result<Outcome<T>, ClientError> {
        self.stop_listening().await;
        let mut ex = self.manager.exchange().await;
        if !ex.is_open() {
            return Err(ClientError::NotConnected);
        }
        let result = ex
            .request(command, params, accepted)
            .await
            .and_then(|response| convert(&response));
        ex.settle(result, true).await
    }

    // -----------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------

    /// Runs one listen step for `page` on the calling task.
    pub async fn receive_batch<P: Page>(
        &self,
        page: &mut P,
    ) -> Result<Outcome<Flow>, ClientError> {
        self.stop_listening().await;
        crate::listen::receive_batch(&self.manager, page).await
    }

    /// Starts listening for `page` in the background, replacing any page
    /// that listens already.
    pub async fn listen<P: Page>(&self, page: P) {
        self.stop_listening().await;
        let task = ListenTask::spawn(Arc::clone(&self.manager), page);
        *self.listener_slot() = Some(task);
    }

    /// Stops the background listener and reports how it ended.
    ///
    /// Returns `None` if nothing was listening.
    pub async fn stop_listening(&self) -> Option<ListenExit> {
        let task = self.listener_slot().take()?;
        let exit = task.stop().await;
        tracing::debug!(?exit, "listener stopped");
        Some(exit)
    }

    fn listener_slot(&self) -> MutexGuard<'_, Option<ListenTask>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn invalid(field: &str, reason: &str) -> ClientError {
    ClientError::InvalidRequest(ProtocolError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    })
}
