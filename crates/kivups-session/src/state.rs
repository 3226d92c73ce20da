//! Session states and the transition table.

use std::fmt;

use kivups_protocol::Trigger;
use serde::{Deserialize, Serialize};

/// Where the client currently is in the game flow.
///
/// ```text
/// Start ──login──→ Lobby ──create/join──→ AwaitingOpponent ──start/41──→ RunningGame
///   │                ↑                                                   │  ↑
///   │ reconnect      └──────────── 42 / 51 (game over) ──────────────────┤  │ 35 / 62
///   ↓                                                                 49 ↓  │
/// Reconnecting ──33/46/47──→ Lobby / AwaitingOpponent / RunningGame   MyTurn ──05──→ RollingDice
///                                                                       ↑              │ 34
///                                                             37        │              ↓
///                                         ResolvingSelection ───────────┘  ←──61── SelectingCubes
///                                                 │ 36 → Lobby
/// Lobby ──logout──→ End
/// ```
///
/// `ServerPingPlayer` loops back to the same state everywhere except
/// `End`. `End` is terminal; only [`reset`](crate::StateMachine::reset)
/// leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Not logged in.
    #[default]
    Start,
    /// Logged in, browsing games.
    Lobby,
    /// Created or joined a game that has not started yet.
    AwaitingOpponent,
    /// In a running game, someone else's turn.
    RunningGame,
    /// Our turn, dice not rolled yet.
    MyTurn,
    /// Roll sent, waiting for the result.
    RollingDice,
    /// Dice rolled, choosing which cubes to keep.
    SelectingCubes,
    /// Selection sent, waiting for the result.
    ResolvingSelection,
    /// Reconnect sent, waiting to learn where the server put us.
    Reconnecting,
    /// Logged out.
    End,
}

impl SessionState {
    /// The destination of `trigger` from this state, if there is one.
    pub fn target(self, trigger: Trigger) -> Option<Self> {
        use SessionState::*;
        use Trigger::*;

        if trigger == ServerPingPlayer {
            return (self != End).then_some(self);
        }

        let next = match (self, trigger) {
            (Start, ClientLogin) => Lobby,
            (Start, ClientReconnect) => Reconnecting,

            (Reconnecting, ResponseServerGameList) => Lobby,
            (Reconnecting, ResponseServerReconnectBeforeGame) => AwaitingOpponent,
            (Reconnecting, ResponseServerReconnectRunningGame) => RunningGame,

            (Lobby, ResponseServerGameList | ServerUpdateGameList) => Lobby,
            (Lobby, ClientCreateGame | ClientJoinGame) => AwaitingOpponent,
            (Lobby, ClientLogout) => End,

            (AwaitingOpponent, ClientStartGame | ServerUpdateStartGame) => RunningGame,
            (AwaitingOpponent, ServerUpdatePlayerList) => AwaitingOpponent,

            (RunningGame, ServerUpdateGameData) => RunningGame,
            (RunningGame, ServerStartTurn) => MyTurn,
            (RunningGame, ServerUpdateEndScore | ServerUpdateNotEnoughPlayers) => Lobby,

            (MyTurn, ClientRollDice) => RollingDice,
            (MyTurn, ServerUpdateGameData) => MyTurn,
            (MyTurn, ServerUpdateEndScore | ServerUpdateNotEnoughPlayers) => Lobby,

            (RollingDice, ResponseServerSelectCubes) => SelectingCubes,
            (RollingDice, ResponseServerEndTurn) => RunningGame,

            (SelectingCubes, ClientSelectedCubes) => ResolvingSelection,
            (SelectingCubes, ClientEndTurn) => RunningGame,
            (SelectingCubes, ServerUpdateGameData) => SelectingCubes,
            (SelectingCubes, ServerUpdateNotEnoughPlayers) => Lobby,

            (ResolvingSelection, ResponseServerEndScore) => Lobby,
            (ResolvingSelection, ResponseServerDiceSuccess) => MyTurn,

            _ => return None,
        };
        Some(next)
    }

    /// Returns `true` if `trigger` has a transition out of this state.
    pub fn allows(self, trigger: Trigger) -> bool {
        self.target(trigger).is_some()
    }

    /// Returns `true` while the player sits inside a game.
    pub fn is_in_game(self) -> bool {
        matches!(
            self,
            Self::RunningGame
                | Self::MyTurn
                | Self::RollingDice
                | Self::SelectingCubes
                | Self::ResolvingSelection
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "Start",
            Self::Lobby => "Lobby",
            Self::AwaitingOpponent => "AwaitingOpponent",
            Self::RunningGame => "RunningGame",
            Self::MyTurn => "MyTurn",
            Self::RollingDice => "RollingDice",
            Self::SelectingCubes => "SelectingCubes",
            Self::ResolvingSelection => "ResolvingSelection",
            Self::Reconnecting => "Reconnecting",
            Self::End => "End",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionState; 10] = [
        SessionState::Start,
        SessionState::Lobby,
        SessionState::AwaitingOpponent,
        SessionState::RunningGame,
        SessionState::MyTurn,
        SessionState::RollingDice,
        SessionState::SelectingCubes,
        SessionState::ResolvingSelection,
        SessionState::Reconnecting,
        SessionState::End,
    ];

    #[test]
    fn test_default_is_start() {
        assert_eq!(SessionState::default(), SessionState::Start);
    }

    #[test]
    fn test_ping_is_self_loop_except_end() {
        for state in ALL {
            let expected = (state != SessionState::End).then_some(state);
            assert_eq!(state.target(Trigger::ServerPingPlayer), expected, "{state}");
        }
    }

    #[test]
    fn test_end_is_terminal() {
        for command in kivups_protocol::registry::commands() {
            if let Some(trigger) = command.trigger {
                assert!(!SessionState::End.allows(trigger), "{trigger}");
            }
        }
    }

    #[test]
    fn test_turn_cycle() {
        let mut state = SessionState::RunningGame;
        for (trigger, expected) in [
            (Trigger::ServerStartTurn, SessionState::MyTurn),
            (Trigger::ClientRollDice, SessionState::RollingDice),
            (Trigger::ResponseServerSelectCubes, SessionState::SelectingCubes),
            (Trigger::ClientSelectedCubes, SessionState::ResolvingSelection),
            (Trigger::ResponseServerDiceSuccess, SessionState::MyTurn),
            (Trigger::ClientRollDice, SessionState::RollingDice),
            (Trigger::ResponseServerEndTurn, SessionState::RunningGame),
        ] {
            state = state.target(trigger).expect("valid step");
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_reconnect_destinations() {
        let r = SessionState::Reconnecting;
        assert_eq!(r.target(Trigger::ResponseServerGameList), Some(SessionState::Lobby));
        assert_eq!(
            r.target(Trigger::ResponseServerReconnectBeforeGame),
            Some(SessionState::AwaitingOpponent)
        );
        assert_eq!(
            r.target(Trigger::ResponseServerReconnectRunningGame),
            Some(SessionState::RunningGame)
        );
        assert_eq!(r.target(Trigger::ClientLogin), None);
    }

    #[test]
    fn test_undefined_pairs_have_no_target() {
        assert_eq!(SessionState::Start.target(Trigger::ClientRollDice), None);
        assert_eq!(SessionState::Lobby.target(Trigger::ServerStartTurn), None);
        assert_eq!(SessionState::RollingDice.target(Trigger::ClientRollDice), None);
        assert_eq!(SessionState::MyTurn.target(Trigger::ClientLogout), None);
    }

    #[test]
    fn test_is_in_game() {
        assert!(SessionState::SelectingCubes.is_in_game());
        assert!(!SessionState::Lobby.is_in_game());
        assert!(!SessionState::AwaitingOpponent.is_in_game());
    }

    #[test]
    fn test_display_and_serde_agree() {
        for state in ALL {
            let json = serde_json::to_value(state).unwrap();
            assert_eq!(json, serde_json::json!(state.to_string()));
        }
    }
}
