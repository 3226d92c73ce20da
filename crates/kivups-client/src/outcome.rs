//! What a command call hands back to the UI.

use kivups_protocol::model::{self, Collection};
use kivups_protocol::{
    CommandId, CubeRoll, GameSummary, Message, Player, PlayerTurnState, ProtocolError,
};
use serde::{Deserialize, Serialize};

use crate::ClientError;

/// The result of a command, from the connection's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The exchange completed on the live connection.
    Connected(T),

    /// The connection dropped mid-exchange, but the reconnect policy got
    /// the session back. The original command was not completed; the UI
    /// should move to the page matching the [`Resume`] data.
    Resumed(Resume),

    /// The connection is gone and could not be restored. The UI should
    /// return to its start page.
    Disconnected,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Connected(value) => Outcome::Connected(f(value)),
            Self::Resumed(resume) => Outcome::Resumed(resume),
            Self::Disconnected => Outcome::Disconnected,
        }
    }

    /// The value, if the exchange completed.
    pub fn connected(self) -> Option<T> {
        match self {
            Self::Connected(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Where the server put the player after a reconnect, with the data the
/// matching page needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resume {
    /// Back in the lobby (`ResponseServerGameList`).
    Lobby(Vec<GameSummary>),
    /// Back in a game that has not started (`ResponseServerReconnectBeforeGame`).
    BeforeGame(Vec<Player>),
    /// Back in a running game (`ResponseServerReconnectRunningGame`).
    RunningGame(Vec<PlayerTurnState>),
}

/// The commands a reconnect can be answered with (besides an error).
pub(crate) const RESUME_COMMANDS: [CommandId; 3] = [
    CommandId::RESPONSE_SERVER_RECONNECT_BEFORE_GAME,
    CommandId::RESPONSE_SERVER_RECONNECT_RUNNING_GAME,
    CommandId::RESPONSE_SERVER_GAME_LIST,
];

impl Resume {
    pub(crate) fn from_message(msg: &Message) -> Result<Self, ClientError> {
        Ok(match model::convert(msg)? {
            Some(Collection::Games(games)) => Self::Lobby(games),
            Some(Collection::Players(players)) => Self::BeforeGame(players),
            Some(Collection::GameData(data)) => Self::RunningGame(data),
            _ => return Err(missing_payload(msg, "reconnect data").into()),
        })
    }
}

/// Result of rolling the dice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollResult {
    /// These cubes can score; pick some.
    Rolled(Vec<CubeRoll>),
    /// Nothing scores, the turn is over.
    TurnOver,
}

/// Result of submitting a cube selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionResult {
    /// Selection accepted, keep rolling.
    Continue,
    /// Selection reached the winning score.
    GameOver,
}

pub(crate) fn games(msg: &Message) -> Result<Vec<GameSummary>, ClientError> {
    match model::convert(msg)? {
        Some(Collection::Games(games)) => Ok(games),
        _ => Err(missing_payload(msg, "game list").into()),
    }
}

pub(crate) fn players(msg: &Message) -> Result<Vec<Player>, ClientError> {
    match model::convert(msg)? {
        Some(Collection::Players(players)) => Ok(players),
        _ => Err(missing_payload(msg, "player list").into()),
    }
}

pub(crate) fn game_data(msg: &Message) -> Result<Vec<PlayerTurnState>, ClientError> {
    match model::convert(msg)? {
        Some(Collection::GameData(data)) => Ok(data),
        _ => Err(missing_payload(msg, "game data").into()),
    }
}

pub(crate) fn cubes(msg: &Message) -> Result<Vec<CubeRoll>, ClientError> {
    match model::convert(msg)? {
        Some(Collection::Cubes(cubes)) => Ok(cubes),
        _ => Err(missing_payload(msg, "cube values").into()),
    }
}

fn missing_payload(msg: &Message, what: &str) -> ProtocolError {
    ProtocolError::InvalidMessage(format!("command {} carries no {what}", msg.command))
}
