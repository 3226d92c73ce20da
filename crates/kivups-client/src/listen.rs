//! Pages and the background listen loop.
//!
//! While the UI shows a page, the server keeps pushing updates: a new
//! game in the lobby, a player joining, someone's score. A [`Page`] says
//! which pushes it understands; [`listen`] polls the connection, routes
//! every push to the page and stops when the page is done or the session
//! has moved on.

use std::sync::Arc;

use kivups_protocol::{
    registry, CommandId, GameSummary, Message, Player, PlayerTurnState, ProtocolError,
};
use kivups_session::SessionState;
use kivups_transport::{Connector, TransportError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::{ConnectionManager, Exchange, ReadMode};
use crate::outcome::{self, Outcome, Resume};
use crate::ClientError;

/// What a page wants after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A server push, converted to what the page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    GameList(Vec<GameSummary>),
    PlayerList(Vec<Player>),
    GameData(Vec<PlayerTurnState>),
    GameStarted,
    TurnStarted,
    GameOver { winner: String },
    NotEnoughPlayers,
}

impl Update {
    pub fn from_message(msg: &Message) -> Result<Self, ClientError> {
        Ok(match msg.command {
            CommandId::SERVER_UPDATE_GAME_LIST => Self::GameList(outcome::games(msg)?),
            CommandId::SERVER_UPDATE_PLAYER_LIST => Self::PlayerList(outcome::players(msg)?),
            CommandId::SERVER_UPDATE_GAME_DATA => Self::GameData(outcome::game_data(msg)?),
            CommandId::SERVER_UPDATE_START_GAME => Self::GameStarted,
            CommandId::SERVER_START_TURN => Self::TurnStarted,
            CommandId::SERVER_UPDATE_END_SCORE => Self::GameOver {
                winner: msg.scalar("playerName").unwrap_or_default().to_string(),
            },
            CommandId::SERVER_UPDATE_NOT_ENOUGH_PLAYERS => Self::NotEnoughPlayers,
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "command {other} is not a server update"
                ))
                .into());
            }
        })
    }

    /// Returns `true` for updates after which the session has left the
    /// page's state.
    pub fn leaves_page(&self) -> bool {
        matches!(
            self,
            Self::GameStarted | Self::TurnStarted | Self::GameOver { .. } | Self::NotEnoughPlayers
        )
    }
}

/// A screen that consumes server pushes.
pub trait Page: Send + 'static {
    /// The session state this page lives in. Listening stops as soon as
    /// the session is anywhere else.
    fn state(&self) -> SessionState;

    /// The push commands this page handles. Any other push while the page
    /// listens is a protocol violation.
    fn accepts(&self) -> &[CommandId];

    fn on_update(&mut self, update: Update) -> Flow;
}

// ---------------------------------------------------------------------------
// Built-in pages
// ---------------------------------------------------------------------------

/// Forwards updates into a channel. Stops on transition updates, or once
/// the receiving side is gone.
#[derive(Debug, Clone)]
struct Forward(mpsc::UnboundedSender<Update>);

impl Forward {
    fn forward(&self, update: Update) -> Flow {
        let leaves = update.leaves_page();
        if self.0.send(update).is_err() || leaves {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

/// The lobby: live game list.
#[derive(Debug, Clone)]
pub struct LobbyPage(Forward);

impl LobbyPage {
    pub fn new(tx: mpsc::UnboundedSender<Update>) -> Self {
        Self(Forward(tx))
    }
}

impl Page for LobbyPage {
    fn state(&self) -> SessionState {
        SessionState::Lobby
    }

    fn accepts(&self) -> &[CommandId] {
        &[CommandId::SERVER_UPDATE_GAME_LIST]
    }

    fn on_update(&mut self, update: Update) -> Flow {
        self.0.forward(update)
    }
}

/// The waiting room of a game that has not started.
#[derive(Debug, Clone)]
pub struct BeforeGamePage(Forward);

impl BeforeGamePage {
    pub fn new(tx: mpsc::UnboundedSender<Update>) -> Self {
        Self(Forward(tx))
    }
}

impl Page for BeforeGamePage {
    fn state(&self) -> SessionState {
        SessionState::AwaitingOpponent
    }

    fn accepts(&self) -> &[CommandId] {
        &[
            CommandId::SERVER_UPDATE_PLAYER_LIST,
            CommandId::SERVER_UPDATE_START_GAME,
        ]
    }

    fn on_update(&mut self, update: Update) -> Flow {
        self.0.forward(update)
    }
}

/// A running game while another player is on turn.
#[derive(Debug, Clone)]
pub struct RunningGamePage(Forward);

impl RunningGamePage {
    pub fn new(tx: mpsc::UnboundedSender<Update>) -> Self {
        Self(Forward(tx))
    }
}

impl Page for RunningGamePage {
    fn state(&self) -> SessionState {
        SessionState::RunningGame
    }

    fn accepts(&self) -> &[CommandId] {
        &[
            CommandId::SERVER_UPDATE_GAME_DATA,
            CommandId::SERVER_START_TURN,
            CommandId::SERVER_UPDATE_END_SCORE,
            CommandId::SERVER_UPDATE_NOT_ENOUGH_PLAYERS,
        ]
    }

    fn on_update(&mut self, update: Update) -> Flow {
        self.0.forward(update)
    }
}

/// Our own turn. Lives in [`SessionState::MyTurn`] before the roll and in
/// [`SessionState::SelectingCubes`] while choosing cubes.
#[derive(Debug, Clone)]
pub struct TurnPage {
    state: SessionState,
    forward: Forward,
}

impl TurnPage {
    pub fn new(state: SessionState, tx: mpsc::UnboundedSender<Update>) -> Self {
        Self {
            state,
            forward: Forward(tx),
        }
    }
}

impl Page for TurnPage {
    fn state(&self) -> SessionState {
        self.state
    }

    fn accepts(&self) -> &[CommandId] {
        &[
            CommandId::SERVER_UPDATE_GAME_DATA,
            CommandId::SERVER_UPDATE_NOT_ENOUGH_PLAYERS,
        ]
    }

    fn on_update(&mut self, update: Update) -> Flow {
        self.forward.forward(update)
    }
}

// ---------------------------------------------------------------------------
// Batch delivery
// ---------------------------------------------------------------------------

impl<K> Exchange<'_, K>
where
    K: Connector<Error = TransportError>,
{
    /// Delivers every push that is ready to `page`.
    ///
    /// Waits up to the poll interval for the first frame, then drains what
    /// is buffered without touching the socket again. Frames left when the
    /// page stops stay buffered for whoever reads next.
    pub(crate) async fn deliver_batch<P: Page>(&mut self, page: &mut P) -> Result<Flow, ClientError> {
        let mut mode = ReadMode::Poll;
        while let Some(msg) = self.next_message(mode).await? {
            mode = ReadMode::Buffered;

            let state = self.state();
            let unexpected = || ClientError::UnexpectedCommand {
                command: msg.command,
                state,
            };
            if !page.accepts().contains(&msg.command) {
                return Err(unexpected());
            }
            let Some(trigger) = registry::trigger(msg.command)? else {
                return Err(unexpected());
            };
            if !state.allows(trigger) {
                return Err(unexpected());
            }

            self.acknowledge(&msg).await?;
            self.fire_inbound(&msg, trigger)?;
            let update = Update::from_message(&msg)?;
            tracing::debug!(command = %msg.command, "update delivered");
            if page.on_update(update) == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }
}

/// One listen step: a batch of pushes, with failures settled.
pub async fn receive_batch<K, P>(
    manager: &ConnectionManager<K>,
    page: &mut P,
) -> Result<Outcome<Flow>, ClientError>
where
    K: Connector<Error = TransportError>,
    P: Page,
{
    let mut exchange = manager.exchange().await;
    if !exchange.is_open() {
        return Err(ClientError::NotConnected);
    }
    let result = exchange.deliver_batch(page).await;
    exchange.settle(result, true).await
}

// ---------------------------------------------------------------------------
// Background loop
// ---------------------------------------------------------------------------

/// Why a listen loop ended.
#[derive(Debug)]
pub enum ListenExit {
    /// The page answered [`Flow::Stop`].
    PageDone,
    /// The session left the page's state.
    StateChanged(SessionState),
    /// [`stop_listening`](crate::Dispatcher::stop_listening) was called.
    Cancelled,
    /// The connection dropped and came back; the UI should switch pages.
    Resumed(Resume),
    Disconnected,
    Failed(ClientError),
    /// The listen task panicked.
    Panicked(String),
}

/// Polls for pushes until the page is done, the session moves on, the
/// connection fails or `stop` is set.
///
/// The stop flag is checked before each batch; a batch that is already
/// running is finished first.
pub async fn listen<K, P>(
    manager: Arc<ConnectionManager<K>>,
    mut page: P,
    stop: watch::Receiver<bool>,
) -> ListenExit
where
    K: Connector<Error = TransportError>,
    P: Page,
{
    loop {
        if *stop.borrow() {
            return ListenExit::Cancelled;
        }
        let state = manager.machine().current();
        if state != page.state() {
            return ListenExit::StateChanged(state);
        }
        match receive_batch(&manager, &mut page).await {
            Ok(Outcome::Connected(Flow::Continue)) => {}
            Ok(Outcome::Connected(Flow::Stop)) => return ListenExit::PageDone,
            Ok(Outcome::Resumed(resume)) => return ListenExit::Resumed(resume),
            Ok(Outcome::Disconnected) => return ListenExit::Disconnected,
            Err(e) => return ListenExit::Failed(e),
        }
    }
}

/// A spawned [`listen`] loop and its stop switch.
pub(crate) struct ListenTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<ListenExit>,
}

impl ListenTask {
    pub(crate) fn spawn<K, P>(manager: Arc<ConnectionManager<K>>, page: P) -> Self
    where
        K: Connector<Error = TransportError>,
        P: Page,
    {
        let (stop, rx) = watch::channel(false);
        let handle = tokio::spawn(listen(manager, page, rx));
        Self { stop, handle }
    }

    /// Signals the loop and waits for it to finish.
    pub(crate) async fn stop(self) -> ListenExit {
        // Fails only if the loop already returned.
        let _ = self.stop.send(true);
        match self.handle.await {
            Ok(exit) => exit,
            Err(e) => ListenExit::Panicked(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kivups_protocol::{Nickname, Param};

    fn msg(command: CommandId, params: Vec<Param>) -> Message {
        Message::new(command, Nickname::parse("Alice123").unwrap(), params)
    }

    #[test]
    fn test_update_from_end_score_names_winner() {
        let update = Update::from_message(&msg(
            CommandId::SERVER_UPDATE_END_SCORE,
            vec![Param::scalar("playerName", "Bob42")],
        ))
        .unwrap();
        assert_eq!(
            update,
            Update::GameOver {
                winner: "Bob42".into()
            }
        );
        assert!(update.leaves_page());
    }

    #[test]
    fn test_update_from_response_is_rejected() {
        let err = Update::from_message(&msg(CommandId::RESPONSE_SERVER_SUCCESS, vec![]))
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_list_update_keeps_page() {
        assert!(!Update::GameList(vec![]).leaves_page());
        assert!(!Update::GameData(vec![]).leaves_page());
    }

    #[test]
    fn test_lobby_page_forwards_and_continues() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut page = LobbyPage::new(tx);
        assert_eq!(page.on_update(Update::GameList(vec![])), Flow::Continue);
        assert_eq!(rx.try_recv().unwrap(), Update::GameList(vec![]));
    }

    #[test]
    fn test_running_game_page_stops_on_turn_start() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut page = RunningGamePage::new(tx);
        assert_eq!(page.on_update(Update::TurnStarted), Flow::Stop);
        assert_eq!(rx.try_recv().unwrap(), Update::TurnStarted);
    }

    #[test]
    fn test_page_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut page = BeforeGamePage::new(tx);
        assert_eq!(page.on_update(Update::PlayerList(vec![])), Flow::Stop);
    }

    #[test]
    fn test_turn_page_lives_in_given_state() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let page = TurnPage::new(SessionState::SelectingCubes, tx);
        assert_eq!(page.state(), SessionState::SelectingCubes);
        assert!(page.accepts().contains(&CommandId::SERVER_UPDATE_GAME_DATA));
        assert!(!page.accepts().contains(&CommandId::SERVER_START_TURN));
    }
}
