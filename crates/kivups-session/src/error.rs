//! Error types for the session layer.

use kivups_protocol::Trigger;

use crate::SessionState;

/// Errors raised by the session state machine.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `trigger` has no transition out of `state`.
    ///
    /// The machine stays where it was. Whether this is fatal depends on
    /// who asked: a local command the UI should not have offered is not,
    /// an inbound server frame the session cannot accept is.
    #[error("trigger {trigger} is not allowed in state {state}")]
    InvalidTransition {
        state: SessionState,
        trigger: Trigger,
    },
}
