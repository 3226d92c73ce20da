//! The command table: every command the client and server exchange.
//!
//! Each entry says which id a command travels under, which way it
//! travels, which parameters it carries (in order) and which state
//! machine trigger it fires when accepted. The table is static and
//! shared with the server bit for bit; nothing here is mutable.
//!
//! ```text
//!  id  name                         params          trigger
//!  01  ClientLogin                  -               ClientLogin
//!  33  ResponseServerGameList       gameList        ResponseServerGameList
//!  50  ServerPingPlayer             -               ServerPingPlayer
//!  60  ResponseClientSuccess        -               (none)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{CommandId, Param};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// A named state machine event.
///
/// Triggers map 1:1 to commands. Plain responses (`30`, `32`) and the
/// client acknowledgement (`60`) have no trigger: they never move the
/// session by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    // -- Client initiated --
    ClientLogin,
    ClientCreateGame,
    ClientJoinGame,
    ClientStartGame,
    ClientRollDice,
    ClientLogout,
    ClientReconnect,
    ClientSelectedCubes,
    ClientEndTurn,

    // -- Server responses --
    ResponseServerGameList,
    ResponseServerSelectCubes,
    ResponseServerEndTurn,
    ResponseServerEndScore,
    ResponseServerDiceSuccess,
    ResponseServerReconnectBeforeGame,
    ResponseServerReconnectRunningGame,

    // -- Server pushes --
    ServerUpdateStartGame,
    ServerUpdateEndScore,
    ServerUpdateGameData,
    ServerUpdateGameList,
    ServerUpdatePlayerList,
    ServerStartTurn,
    ServerPingPlayer,
    ServerUpdateNotEnoughPlayers,
}

impl Trigger {
    /// Stable name, used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClientLogin => "ClientLogin",
            Self::ClientCreateGame => "ClientCreateGame",
            Self::ClientJoinGame => "ClientJoinGame",
            Self::ClientStartGame => "ClientStartGame",
            Self::ClientRollDice => "ClientRollDice",
            Self::ClientLogout => "ClientLogout",
            Self::ClientReconnect => "ClientReconnect",
            Self::ClientSelectedCubes => "ClientSelectedCubes",
            Self::ClientEndTurn => "ClientEndTurn",
            Self::ResponseServerGameList => "ResponseServerGameList",
            Self::ResponseServerSelectCubes => "ResponseServerSelectCubes",
            Self::ResponseServerEndTurn => "ResponseServerEndTurn",
            Self::ResponseServerEndScore => "ResponseServerEndScore",
            Self::ResponseServerDiceSuccess => "ResponseServerDiceSuccess",
            Self::ResponseServerReconnectBeforeGame => {
                "ResponseServerReconnectBeforeGame"
            }
            Self::ResponseServerReconnectRunningGame => {
                "ResponseServerReconnectRunningGame"
            }
            Self::ServerUpdateStartGame => "ServerUpdateStartGame",
            Self::ServerUpdateEndScore => "ServerUpdateEndScore",
            Self::ServerUpdateGameData => "ServerUpdateGameData",
            Self::ServerUpdateGameList => "ServerUpdateGameList",
            Self::ServerUpdatePlayerList => "ServerUpdatePlayerList",
            Self::ServerStartTurn => "ServerStartTurn",
            Self::ServerPingPlayer => "ServerPingPlayer",
            Self::ServerUpdateNotEnoughPlayers => "ServerUpdateNotEnoughPlayers",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Command descriptors
// ---------------------------------------------------------------------------

/// Which way a command travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client request (or the client's acknowledgement).
    ClientToServer,
    /// Server answer to a client request.
    Response,
    /// Server-initiated update.
    Push,
}

/// The typed collection a list parameter converts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// `gameName, maxPlayers, connectedPlayers`
    Games,
    /// `playerName, isConnected`
    Players,
    /// `playerName, isConnected, score, isTurn`
    GameData,
    /// `value`
    Cubes,
}

impl ListKind {
    /// The exact field names every record of this list carries, in order.
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Games => &["gameName", "maxPlayers", "connectedPlayers"],
            Self::Players => &["playerName", "isConnected"],
            Self::GameData => &["playerName", "isConnected", "score", "isTurn"],
            Self::Cubes => &["value"],
        }
    }
}

/// A static command descriptor.
#[derive(Debug)]
pub struct Command {
    pub id: CommandId,
    pub name: &'static str,
    pub direction: Direction,
    pub trigger: Option<Trigger>,
    /// Parameter names in wire order. Empty means the block is `{}`.
    pub params: &'static [&'static str],
    /// Set when the single parameter is a list with a typed conversion.
    pub list: Option<ListKind>,
}

impl Command {
    /// Checks that `params` carries exactly the registered names, in order.
    pub fn check_params(&self, params: &[Param]) -> Result<(), ProtocolError> {
        let matches = params.len() == self.params.len()
            && params
                .iter()
                .zip(self.params)
                .all(|(param, expected)| param.name == *expected);
        if matches {
            return Ok(());
        }
        Err(ProtocolError::ParamMismatch {
            command: self.id,
            expected: self.params.iter().map(|s| s.to_string()).collect(),
            found: params.iter().map(|p| p.name.clone()).collect(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// The table
// ---------------------------------------------------------------------------

const fn cmd(
    id: u8,
    name: &'static str,
    direction: Direction,
    trigger: Option<Trigger>,
    params: &'static [&'static str],
    list: Option<ListKind>,
) -> Command {
    Command {
        id: CommandId(id),
        name,
        direction,
        trigger,
        params,
        list,
    }
}

use Direction::{ClientToServer as C2S, Push, Response};

static COMMANDS: &[Command] = &[
    cmd(1, "ClientLogin", C2S, Some(Trigger::ClientLogin), &[], None),
    cmd(
        2,
        "ClientCreateGame",
        C2S,
        Some(Trigger::ClientCreateGame),
        &["gameName", "maxPlayers"],
        None,
    ),
    cmd(3, "ClientJoinGame", C2S, Some(Trigger::ClientJoinGame), &["gameName"], None),
    cmd(4, "ClientStartGame", C2S, Some(Trigger::ClientStartGame), &[], None),
    cmd(5, "ClientRollDice", C2S, Some(Trigger::ClientRollDice), &[], None),
    cmd(7, "ClientLogout", C2S, Some(Trigger::ClientLogout), &[], None),
    cmd(8, "ClientReconnect", C2S, Some(Trigger::ClientReconnect), &[], None),
    cmd(30, "ResponseServerSuccess", Response, None, &[], None),
    cmd(32, "ResponseServerError", Response, None, &["message"], None),
    cmd(
        33,
        "ResponseServerGameList",
        Response,
        Some(Trigger::ResponseServerGameList),
        &["gameList"],
        Some(ListKind::Games),
    ),
    cmd(
        34,
        "ResponseServerSelectCubes",
        Response,
        Some(Trigger::ResponseServerSelectCubes),
        &["cubeValues"],
        Some(ListKind::Cubes),
    ),
    cmd(
        35,
        "ResponseServerEndTurn",
        Response,
        Some(Trigger::ResponseServerEndTurn),
        &[],
        None,
    ),
    cmd(
        36,
        "ResponseServerEndScore",
        Response,
        Some(Trigger::ResponseServerEndScore),
        &[],
        None,
    ),
    cmd(
        37,
        "ResponseServerDiceSuccess",
        Response,
        Some(Trigger::ResponseServerDiceSuccess),
        &[],
        None,
    ),
    cmd(
        41,
        "ServerUpdateStartGame",
        Push,
        Some(Trigger::ServerUpdateStartGame),
        &[],
        None,
    ),
    cmd(
        42,
        "ServerUpdateEndScore",
        Push,
        Some(Trigger::ServerUpdateEndScore),
        &["playerName"],
        None,
    ),
    cmd(
        43,
        "ServerUpdateGameData",
        Push,
        Some(Trigger::ServerUpdateGameData),
        &["gameData"],
        Some(ListKind::GameData),
    ),
    cmd(
        44,
        "ServerUpdateGameList",
        Push,
        Some(Trigger::ServerUpdateGameList),
        &["gameList"],
        Some(ListKind::Games),
    ),
    cmd(
        45,
        "ServerUpdatePlayerList",
        Push,
        Some(Trigger::ServerUpdatePlayerList),
        &["playerList"],
        Some(ListKind::Players),
    ),
    cmd(
        46,
        "ResponseServerReconnectBeforeGame",
        Response,
        Some(Trigger::ResponseServerReconnectBeforeGame),
        &["playerList"],
        Some(ListKind::Players),
    ),
    cmd(
        47,
        "ResponseServerReconnectRunningGame",
        Response,
        Some(Trigger::ResponseServerReconnectRunningGame),
        &["gameData"],
        Some(ListKind::GameData),
    ),
    cmd(49, "ServerStartTurn", Push, Some(Trigger::ServerStartTurn), &[], None),
    cmd(50, "ServerPingPlayer", Push, Some(Trigger::ServerPingPlayer), &[], None),
    cmd(
        51,
        "ServerUpdateNotEnoughPlayers",
        Push,
        Some(Trigger::ServerUpdateNotEnoughPlayers),
        &[],
        None,
    ),
    cmd(60, "ResponseClientSuccess", C2S, None, &[], None),
    cmd(
        61,
        "ClientSelectedCubes",
        C2S,
        Some(Trigger::ClientSelectedCubes),
        &["cubeValues"],
        Some(ListKind::Cubes),
    ),
    cmd(62, "ClientEndTurn", C2S, Some(Trigger::ClientEndTurn), &[], None),
];

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Every registered command, in id order.
pub fn commands() -> &'static [Command] {
    COMMANDS
}

/// Finds the command registered under `id`.
pub fn lookup(id: CommandId) -> Result<&'static Command, ProtocolError> {
    COMMANDS
        .iter()
        .find(|c| c.id == id)
        .ok_or(ProtocolError::UnknownCommand(id))
}

/// Finds the command that fires `trigger`.
pub fn by_trigger(trigger: Trigger) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.trigger == Some(trigger))
}

/// The trigger fired when a command with `id` is accepted, if any.
pub fn trigger(id: CommandId) -> Result<Option<Trigger>, ProtocolError> {
    Ok(lookup(id)?.trigger)
}

/// Parameter names registered for `id`, in wire order.
pub fn expected_params(id: CommandId) -> Result<&'static [&'static str], ProtocolError> {
    Ok(lookup(id)?.params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_sorted() {
        let ids: Vec<u8> = commands().iter().map(|c| c.id.0).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_every_id_fits_two_digits() {
        assert!(commands().iter().all(|c| c.id.0 <= 99));
    }

    #[test]
    fn test_triggers_map_back_to_their_command() {
        for command in commands() {
            if let Some(trigger) = command.trigger {
                let found = by_trigger(trigger).expect("trigger registered");
                assert_eq!(found.id, command.id, "{trigger}");
                assert_eq!(trigger.name(), command.name);
            }
        }
    }

    #[test]
    fn test_lookup_unknown_id_fails() {
        assert!(matches!(
            lookup(CommandId(6)),
            Err(ProtocolError::UnknownCommand(CommandId(6)))
        ));
        assert!(lookup(CommandId(99)).is_err());
    }

    #[test]
    fn test_plain_responses_have_no_trigger() {
        assert_eq!(trigger(CommandId::RESPONSE_SERVER_SUCCESS).unwrap(), None);
        assert_eq!(trigger(CommandId::RESPONSE_SERVER_ERROR).unwrap(), None);
        assert_eq!(trigger(CommandId::RESPONSE_CLIENT_SUCCESS).unwrap(), None);
    }

    #[test]
    fn test_expected_params() {
        assert_eq!(
            expected_params(CommandId::CLIENT_CREATE_GAME).unwrap(),
            ["gameName", "maxPlayers"]
        );
        assert!(expected_params(CommandId::CLIENT_LOGIN).unwrap().is_empty());
    }

    #[test]
    fn test_list_commands_have_exactly_one_param() {
        for command in commands().iter().filter(|c| c.list.is_some()) {
            assert_eq!(command.params.len(), 1, "{command}");
        }
    }

    #[test]
    fn test_check_params_requires_names_in_order() {
        let create = lookup(CommandId::CLIENT_CREATE_GAME).unwrap();
        let good = [Param::scalar("gameName", "G1"), Param::scalar("maxPlayers", "4")];
        let swapped = [Param::scalar("maxPlayers", "4"), Param::scalar("gameName", "G1")];
        let short = [Param::scalar("gameName", "G1")];

        assert!(create.check_params(&good).is_ok());
        assert!(matches!(
            create.check_params(&swapped),
            Err(ProtocolError::ParamMismatch { .. })
        ));
        assert!(create.check_params(&short).is_err());
    }

    #[test]
    fn test_check_params_empty_list() {
        let login = lookup(CommandId::CLIENT_LOGIN).unwrap();
        assert!(login.check_params(&[]).is_ok());
        assert!(login.check_params(&[Param::scalar("x", "y")]).is_err());
    }
}
