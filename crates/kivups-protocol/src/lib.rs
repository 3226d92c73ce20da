//! Wire protocol for the KIVUPS dice game.
//!
//! This crate defines the "language" the client and the game server speak:
//!
//! - **Types** ([`Message`], [`Param`], [`CommandId`], ...): the parsed
//!   form of one frame.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): how a message becomes a
//!   `\n`-terminated line of bytes and back.
//! - **Registry** ([`registry`]): the static command table: ids,
//!   parameter names and the state machine trigger each command fires.
//! - **Model** ([`model`]): typed game data decoded from list parameters.
//! - **Errors** ([`ProtocolError`]): what can go wrong along the way.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the client
//! session. It doesn't know about sockets or states; it only knows what a
//! valid frame looks like.
//!
//! ```text
//! Transport (bytes) → Framing (lines) → Protocol (Message) → Session
//! ```

mod codec;
mod error;
pub mod model;
pub mod registry;
mod types;

pub use codec::{Codec, TextCodec};
pub use error::ProtocolError;
pub use model::{Collection, CubeRoll, GameSummary, ListItem, Player, PlayerTurnState};
pub use registry::{Command, Direction, ListKind, Trigger};
pub use types::{
    COMMAND_ID_LEN, CommandId, Field, Message, NICKNAME_MAX_LEN, NICKNAME_MIN_LEN, Nickname,
    Param, ParamValue, Record, SIGNATURE, TERMINATOR, TIMESTAMP_FORMAT, TIMESTAMP_LEN, Timestamp,
};
