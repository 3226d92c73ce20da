//! Error types for the protocol layer.
//!
//! Everything in here is a *format* problem: the bytes (or the typed
//! payload inside them) do not follow the wire rules. The client treats
//! any of these on an inbound frame as fatal for the connection.

use crate::types::CommandId;

/// Errors that can occur while encoding, decoding or converting messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame does not follow the wire grammar (bad signature,
    /// unbalanced brackets, trailing bytes, non-ASCII input, ...).
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame does not end with the `\n` terminator.
    #[error("frame is missing the line terminator")]
    MissingTerminator,

    /// The command id parsed fine but is not in the command table.
    #[error("unknown command id {0}")]
    UnknownCommand(CommandId),

    /// A header field (timestamp, nickname, parameter name) is invalid.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The parameter names do not match what the command table declares.
    #[error("command {command} expects parameters {expected:?}, got {found:?}")]
    ParamMismatch {
        command: CommandId,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A list payload was well-formed but a value broke a domain rule
    /// (cube outside 1..=6, non-numeric score, `connected > max`, ...).
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A frame grew past the configured size limit without a terminator.
    #[error("frame exceeds {0} bytes")]
    FrameTooLarge(usize),

    /// The message cannot be put on the wire (reserved characters,
    /// wrong signature, id that does not fit two digits).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
