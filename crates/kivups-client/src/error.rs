//! Unified error type for the client.

use kivups_protocol::{CommandId, ProtocolError};
use kivups_session::{SessionError, SessionState};
use kivups_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant auto-generates `From`
/// impls, so the `?` operator converts sub-crate errors automatically.
///
/// Use [`is_fatal`](Self::is_fatal) to decide what the UI does: a fatal
/// error has already closed the connection and reset the session, so the
/// player goes back to the start page. Anything else is shown as a
/// message and the player stays where they are.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (connect, send, recv, idle timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An inbound frame broke the wire format or carried invalid data.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A local command is not allowed in the current session state.
    /// Nothing was sent.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server sent a command that makes no sense right now.
    #[error("unexpected command {command} in state {state}")]
    UnexpectedCommand {
        command: CommandId,
        state: SessionState,
    },

    /// The server answered with `ResponseServerError`.
    #[error("server error: {0}")]
    ServerReported(String),

    /// The request failed local validation and was not sent.
    #[error("request rejected: {0}")]
    InvalidRequest(#[source] ProtocolError),

    /// There is no open connection.
    #[error("not connected")]
    NotConnected,
}

impl ClientError {
    /// Returns `true` if this error ends the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Protocol(_) | Self::UnexpectedCommand { .. }
        )
    }
}
