//! Core protocol types for the KIVUPS wire format.
//!
//! Every frame on the wire carries the same header followed by a
//! parameter block:
//!
//! ```text
//! KIVUPS 01 2024-03-01 12:00:00.000000 {Alice123} {"name":"value",...} \n
//! ```
//!
//! (spaces added for readability; the real frame has no separators
//! between the header fields.)
//!
//! The types here are the *parsed* form of that frame. Header values are
//! newtypes that can only be built through validating constructors, so a
//! `Message` in memory always has a well-formed timestamp and nickname.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// The literal every frame starts with.
pub const SIGNATURE: &str = "KIVUPS";

/// Width of the command id field (zero padded).
pub const COMMAND_ID_LEN: usize = 2;

/// Width of the timestamp field.
pub const TIMESTAMP_LEN: usize = 26;

/// `chrono` format for the timestamp field: `2024-03-01 12:00:00.000000`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Shortest allowed nickname.
pub const NICKNAME_MIN_LEN: usize = 3;

/// Longest allowed nickname.
pub const NICKNAME_MAX_LEN: usize = 20;

/// Every frame ends with this byte.
pub const TERMINATOR: u8 = b'\n';

// ---------------------------------------------------------------------------
// CommandId
// ---------------------------------------------------------------------------

/// The two-digit command number in a frame header.
///
/// The known ids live on this type as associated constants so call sites
/// read like `CommandId::CLIENT_LOGIN` instead of a bare `1`. Whether an
/// id is *known* is decided by the [registry](crate::registry), not here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommandId(pub u8);

impl CommandId {
    pub const CLIENT_LOGIN: Self = Self(1);
    pub const CLIENT_CREATE_GAME: Self = Self(2);
    pub const CLIENT_JOIN_GAME: Self = Self(3);
    pub const CLIENT_START_GAME: Self = Self(4);
    pub const CLIENT_ROLL_DICE: Self = Self(5);
    pub const CLIENT_LOGOUT: Self = Self(7);
    pub const CLIENT_RECONNECT: Self = Self(8);

    pub const RESPONSE_SERVER_SUCCESS: Self = Self(30);
    pub const RESPONSE_SERVER_ERROR: Self = Self(32);
    pub const RESPONSE_SERVER_GAME_LIST: Self = Self(33);
    pub const RESPONSE_SERVER_SELECT_CUBES: Self = Self(34);
    pub const RESPONSE_SERVER_END_TURN: Self = Self(35);
    pub const RESPONSE_SERVER_END_SCORE: Self = Self(36);
    pub const RESPONSE_SERVER_DICE_SUCCESS: Self = Self(37);

    pub const SERVER_UPDATE_START_GAME: Self = Self(41);
    pub const SERVER_UPDATE_END_SCORE: Self = Self(42);
    pub const SERVER_UPDATE_GAME_DATA: Self = Self(43);
    pub const SERVER_UPDATE_GAME_LIST: Self = Self(44);
    pub const SERVER_UPDATE_PLAYER_LIST: Self = Self(45);
    pub const RESPONSE_SERVER_RECONNECT_BEFORE_GAME: Self = Self(46);
    pub const RESPONSE_SERVER_RECONNECT_RUNNING_GAME: Self = Self(47);
    pub const SERVER_START_TURN: Self = Self(49);
    pub const SERVER_PING_PLAYER: Self = Self(50);
    pub const SERVER_UPDATE_NOT_ENOUGH_PLAYERS: Self = Self(51);

    pub const RESPONSE_CLIENT_SUCCESS: Self = Self(60);
    pub const CLIENT_SELECTED_CUBES: Self = Self(61);
    pub const CLIENT_END_TURN: Self = Self(62);
}

/// Prints the id the way it appears on the wire: `01`, `33`, `60`.
impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A 26-character wire timestamp, `YYYY-MM-DD HH:MM:SS.ffffff`.
///
/// Kept as the original text rather than a parsed `NaiveDateTime`:
/// acknowledgements must echo the server's timestamp byte for byte, and
/// re-formatting could change it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(String);

impl Timestamp {
    /// The current local time in wire format.
    pub fn now() -> Self {
        Self(Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    /// Validates `s` as a wire timestamp.
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        if s.len() != TIMESTAMP_LEN {
            return Err(ProtocolError::field(
                "timestamp",
                format!("expected {TIMESTAMP_LEN} characters, got {}", s.len()),
            ));
        }
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .map_err(|e| ProtocolError::field("timestamp", e.to_string()))?;
        Ok(Self(s.to_string()))
    }

    /// The timestamp text exactly as it travels on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ---------------------------------------------------------------------------
// Nickname
// ---------------------------------------------------------------------------

/// A player nickname: 3 to 20 ASCII letters or digits.
///
/// The same nickname identifies the player in every frame of a session,
/// in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nickname(String);

impl Nickname {
    /// Validates `s` as a nickname.
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        let len = s.chars().count();
        if !(NICKNAME_MIN_LEN..=NICKNAME_MAX_LEN).contains(&len) {
            return Err(ProtocolError::field(
                "nickname",
                format!(
                    "length must be {NICKNAME_MIN_LEN}-{NICKNAME_MAX_LEN}, got {len}"
                ),
            ));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProtocolError::field(
                "nickname",
                "only ASCII letters and digits are allowed",
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nickname {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Nickname {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Nickname> for String {
    fn from(nick: Nickname) -> Self {
        nick.0
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// One `"name":"value"` pair inside a list record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// One `{...}` element of a list parameter: an ordered set of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub fields: Vec<Field>,
}

impl Record {
    /// Builds a record from `(name, value)` pairs, keeping their order.
    pub fn new<N, V>(fields: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| Field {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// The value of the first field called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Field names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// The value of a top-level parameter.
///
/// Decided once, at parse time: a quoted value that opens with `[` is a
/// list of records, anything else is a plain scalar string. Nothing
/// downstream has to sniff brackets again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<Record>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            Self::List(records) => Some(records),
            Self::Scalar(_) => None,
        }
    }
}

/// A named top-level parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

impl Param {
    pub fn scalar(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Scalar(value.into()),
        }
    }

    pub fn list(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::List(records),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One complete protocol frame, parsed.
///
/// Messages are built once (by the codec on decode, or by the caller
/// before encode) and not changed afterwards. Resending means building a
/// new message with a fresh timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Always [`SIGNATURE`] for frames that passed decoding.
    pub signature: String,
    pub command: CommandId,
    pub timestamp: Timestamp,
    pub nickname: Nickname,
    pub params: Vec<Param>,
}

impl Message {
    /// Builds an outbound message stamped with the current time.
    pub fn new(command: CommandId, nickname: Nickname, params: Vec<Param>) -> Self {
        Self::with_timestamp(command, nickname, Timestamp::now(), params)
    }

    /// Builds a message with an explicit timestamp.
    ///
    /// Used for acknowledgements, which echo the timestamp of the frame
    /// they acknowledge.
    pub fn with_timestamp(
        command: CommandId,
        nickname: Nickname,
        timestamp: Timestamp,
        params: Vec<Param>,
    ) -> Self {
        Self {
            signature: SIGNATURE.to_string(),
            command,
            timestamp,
            nickname,
            params,
        }
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Looks up a scalar parameter by name.
    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(ParamValue::as_scalar)
    }
}
