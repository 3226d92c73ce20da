//! Typed game data carried inside list parameters.
//!
//! On the wire every list is a sequence of string records. This module
//! turns those records into real types (and back), enforcing the domain
//! rules while doing it. A record that does not convert is a protocol
//! error; there are no silent defaults.

use serde::{Deserialize, Serialize};

use crate::registry::{self, ListKind};
use crate::types::{Message, Param, ParamValue, Record};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// One row of the lobby's game list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub name: String,
    pub connected_players: u32,
    pub max_players: u32,
}

/// A player as shown in the pre-game waiting room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub is_connected: bool,
}

/// A player's standing in a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTurnState {
    pub name: String,
    pub is_connected: bool,
    pub score: u32,
    pub is_turn: bool,
}

/// The face value of one die, always `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CubeRoll(u8);

impl CubeRoll {
    pub fn new(value: u8) -> Result<Self, ProtocolError> {
        if (1..=6).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ProtocolError::value("value", format!("{value} is not a die face")))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CubeRoll {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CubeRoll> for u8 {
    fn from(cube: CubeRoll) -> Self {
        cube.0
    }
}

// ---------------------------------------------------------------------------
// Record conversion
// ---------------------------------------------------------------------------

/// A type that is carried as one record of a list parameter.
pub trait ListItem: Sized {
    /// Which list this item belongs to (and so which fields it has).
    const KIND: ListKind;

    /// Builds the item from a record whose field names were already
    /// checked against [`ListKind::fields`].
    fn from_record(record: &Record) -> Result<Self, ProtocolError>;

    /// Serializes the item into a record with fields in wire order.
    fn to_record(&self) -> Record;
}

impl ListItem for GameSummary {
    const KIND: ListKind = ListKind::Games;

    fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        let name = required(record, "gameName")?.to_string();
        let max_players = parse_count(record, "maxPlayers")?;
        let connected_players = parse_count(record, "connectedPlayers")?;
        if max_players == 0 {
            return Err(ProtocolError::value("maxPlayers", "must be at least 1"));
        }
        if connected_players > max_players {
            return Err(ProtocolError::value(
                "connectedPlayers",
                format!("{connected_players} exceeds maxPlayers {max_players}"),
            ));
        }
        Ok(Self {
            name,
            connected_players,
            max_players,
        })
    }

    fn to_record(&self) -> Record {
        Record::new([
            ("gameName", self.name.clone()),
            ("maxPlayers", self.max_players.to_string()),
            ("connectedPlayers", self.connected_players.to_string()),
        ])
    }
}

impl ListItem for Player {
    const KIND: ListKind = ListKind::Players;

    fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: required(record, "playerName")?.to_string(),
            is_connected: parse_flag(record, "isConnected")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new([
            ("playerName", self.name.clone()),
            ("isConnected", flag(self.is_connected).to_string()),
        ])
    }
}

impl ListItem for PlayerTurnState {
    const KIND: ListKind = ListKind::GameData;

    fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: required(record, "playerName")?.to_string(),
            is_connected: parse_flag(record, "isConnected")?,
            score: parse_count(record, "score")?,
            is_turn: parse_flag(record, "isTurn")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new([
            ("playerName", self.name.clone()),
            ("isConnected", flag(self.is_connected).to_string()),
            ("score", self.score.to_string()),
            ("isTurn", flag(self.is_turn).to_string()),
        ])
    }
}

impl ListItem for CubeRoll {
    const KIND: ListKind = ListKind::Cubes;

    fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        let raw = required(record, "value")?;
        let value: u8 = raw
            .parse()
            .map_err(|_| ProtocolError::value("value", format!("{raw:?} is not a number")))?;
        Self::new(value)
    }

    fn to_record(&self) -> Record {
        Record::new([("value", self.0.to_string())])
    }
}

fn required<'a>(record: &'a Record, name: &str) -> Result<&'a str, ProtocolError> {
    record
        .get(name)
        .ok_or_else(|| ProtocolError::field(name, "missing from record"))
}

fn parse_count(record: &Record, name: &str) -> Result<u32, ProtocolError> {
    let raw = required(record, name)?;
    raw.parse()
        .map_err(|_| ProtocolError::value(name, format!("{raw:?} is not a non-negative integer")))
}

// Booleans travel as "1" / "0".
fn parse_flag(record: &Record, name: &str) -> Result<bool, ProtocolError> {
    match required(record, name)? {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ProtocolError::value(name, format!("{other:?} is not 1 or 0"))),
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Converts every record of a list, checking field names first.
pub fn parse_list<T: ListItem>(records: &[Record]) -> Result<Vec<T>, ProtocolError> {
    let fields = T::KIND.fields();
    records
        .iter()
        .map(|record| {
            if !record.names().eq(fields.iter().copied()) {
                return Err(ProtocolError::field(
                    "record",
                    format!(
                        "expected fields {fields:?}, got {:?}",
                        record.names().collect::<Vec<_>>()
                    ),
                ));
            }
            T::from_record(record)
        })
        .collect()
}

/// Builds a list parameter from typed items.
pub fn to_param<T: ListItem>(name: &str, items: &[T]) -> Param {
    Param::list(name, items.iter().map(ListItem::to_record).collect())
}

// ---------------------------------------------------------------------------
// Message-level conversion
// ---------------------------------------------------------------------------

/// The typed payload of a list-carrying command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collection {
    Games(Vec<GameSummary>),
    Players(Vec<Player>),
    GameData(Vec<PlayerTurnState>),
    Cubes(Vec<CubeRoll>),
}

/// Converts the list parameter of `message` into its typed collection.
///
/// Returns `Ok(None)` for commands that do not declare a list. The
/// parameter names are assumed to be registry-checked already (the codec
/// does that on decode); the list itself is validated here.
pub fn convert(message: &Message) -> Result<Option<Collection>, ProtocolError> {
    let command = registry::lookup(message.command)?;
    let Some(kind) = command.list else {
        return Ok(None);
    };
    command.check_params(&message.params)?;

    // check_params guarantees exactly one parameter for list commands.
    let Some(param) = message.params.first() else {
        return Err(ProtocolError::field(command.name, "list parameter missing"));
    };
    let records = match &param.value {
        ParamValue::List(records) => records,
        ParamValue::Scalar(_) => {
            return Err(ProtocolError::field(
                param.name.clone(),
                "expected a list value",
            ));
        }
    };

    let collection = match kind {
        ListKind::Games => Collection::Games(parse_list(records)?),
        ListKind::Players => Collection::Players(parse_list(records)?),
        ListKind::GameData => Collection::GameData(parse_list(records)?),
        ListKind::Cubes => Collection::Cubes(parse_list(records)?),
    };
    Ok(Some(collection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandId, Nickname};

    fn message(command: CommandId, params: Vec<Param>) -> Message {
        Message::new(command, Nickname::parse("Alice123").unwrap(), params)
    }

    fn game(name: &str, max: &str, connected: &str) -> Record {
        Record::new([
            ("gameName", name),
            ("maxPlayers", max),
            ("connectedPlayers", connected),
        ])
    }

    // =====================================================================
    // Games
    // =====================================================================

    #[test]
    fn test_convert_game_list() {
        let msg = message(
            CommandId::RESPONSE_SERVER_GAME_LIST,
            vec![Param::list("gameList", vec![game("G1", "4", "2")])],
        );
        let converted = convert(&msg).unwrap();
        assert_eq!(
            converted,
            Some(Collection::Games(vec![GameSummary {
                name: "G1".into(),
                connected_players: 2,
                max_players: 4,
            }]))
        );
    }

    #[test]
    fn test_empty_game_list_is_fine() {
        let msg = message(
            CommandId::SERVER_UPDATE_GAME_LIST,
            vec![Param::list("gameList", vec![])],
        );
        assert_eq!(convert(&msg).unwrap(), Some(Collection::Games(vec![])));
    }

    #[test]
    fn test_game_with_more_players_than_max_is_rejected() {
        let err = parse_list::<GameSummary>(&[game("G1", "2", "3")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_game_with_zero_max_is_rejected() {
        assert!(parse_list::<GameSummary>(&[game("G1", "0", "0")]).is_err());
    }

    #[test]
    fn test_non_numeric_count_is_rejected() {
        assert!(parse_list::<GameSummary>(&[game("G1", "four", "2")]).is_err());
        assert!(parse_list::<GameSummary>(&[game("G1", "4", "-1")]).is_err());
    }

    #[test]
    fn test_record_with_fields_out_of_order_is_rejected() {
        let swapped = Record::new([
            ("maxPlayers", "4"),
            ("gameName", "G1"),
            ("connectedPlayers", "2"),
        ]);
        let err = parse_list::<GameSummary>(&[swapped]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { .. }));
    }

    // =====================================================================
    // Players and game data
    // =====================================================================

    #[test]
    fn test_convert_player_list() {
        let records = vec![
            Record::new([("playerName", "Alice123"), ("isConnected", "1")]),
            Record::new([("playerName", "Bob"), ("isConnected", "0")]),
        ];
        let players: Vec<Player> = parse_list(&records).unwrap();
        assert_eq!(players.len(), 2);
        assert!(players[0].is_connected);
        assert!(!players[1].is_connected);
    }

    #[test]
    fn test_boolean_must_be_one_or_zero() {
        let record = Record::new([("playerName", "Bob"), ("isConnected", "true")]);
        assert!(parse_list::<Player>(&[record]).is_err());
    }

    #[test]
    fn test_convert_game_data() {
        let record = Record::new([
            ("playerName", "Bob"),
            ("isConnected", "1"),
            ("score", "350"),
            ("isTurn", "1"),
        ]);
        let msg = message(
            CommandId::SERVER_UPDATE_GAME_DATA,
            vec![Param::list("gameData", vec![record])],
        );
        let Some(Collection::GameData(data)) = convert(&msg).unwrap() else {
            panic!("expected game data");
        };
        assert_eq!(data[0].score, 350);
        assert!(data[0].is_turn);
    }

    // =====================================================================
    // Cubes
    // =====================================================================

    #[test]
    fn test_cube_values_must_be_die_faces() {
        assert!(CubeRoll::new(0).is_err());
        assert!(CubeRoll::new(7).is_err());
        assert_eq!(CubeRoll::new(6).unwrap().value(), 6);

        let bad = Record::new([("value", "9")]);
        assert!(parse_list::<CubeRoll>(&[bad]).is_err());
    }

    #[test]
    fn test_cubes_to_param_builds_value_records() {
        let cubes = [CubeRoll::new(1).unwrap(), CubeRoll::new(5).unwrap()];
        let param = to_param("cubeValues", &cubes);
        let records = param.value.as_list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("value"), Some("5"));
    }

    #[test]
    fn test_cube_roll_deserialize_validates() {
        assert!(serde_json::from_str::<CubeRoll>("3").is_ok());
        assert!(serde_json::from_str::<CubeRoll>("8").is_err());
    }

    // =====================================================================
    // convert()
    // =====================================================================

    #[test]
    fn test_convert_returns_none_without_list() {
        let msg = message(CommandId::RESPONSE_SERVER_SUCCESS, vec![]);
        assert_eq!(convert(&msg).unwrap(), None);
    }

    #[test]
    fn test_convert_rejects_scalar_where_list_expected() {
        let msg = message(
            CommandId::RESPONSE_SERVER_GAME_LIST,
            vec![Param::scalar("gameList", "nope")],
        );
        assert!(convert(&msg).is_err());
    }

    #[test]
    fn test_summary_serializes_with_snake_case_fields() {
        let summary = GameSummary {
            name: "G1".into(),
            connected_players: 1,
            max_players: 4,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["connected_players"], 1);
        assert_eq!(json["max_players"], 4);
    }
}
