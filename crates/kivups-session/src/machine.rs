//! The shared state machine value.
//!
//! # Concurrency note
//!
//! `StateMachine` wraps its state in a plain `std::sync::Mutex`. Every
//! operation is a short check-and-set that never awaits, so a blocking
//! mutex is enough, and the machine can sit in an `Arc` shared between
//! the foreground exchange path and a background page listener.

use std::sync::{Mutex, MutexGuard, PoisonError};

use kivups_protocol::Trigger;

use crate::{SessionError, SessionState};

/// Validates and applies session transitions.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: Mutex<SessionState>,
}

impl StateMachine {
    /// Creates a machine in [`SessionState::Start`].
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written state
    // (it is a single `Copy` value), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current state.
    pub fn current(&self) -> SessionState {
        *self.lock()
    }

    /// Returns `true` if `trigger` is valid from the current state.
    pub fn can_fire(&self, trigger: Trigger) -> bool {
        self.lock().allows(trigger)
    }

    /// Applies `trigger` and returns the new state.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] if there is no
    /// transition for `trigger`. The state is left unchanged.
    pub fn fire(&self, trigger: Trigger) -> Result<SessionState, SessionError> {
        let mut state = self.lock();
        let from = *state;
        let Some(to) = from.target(trigger) else {
            return Err(SessionError::InvalidTransition {
                state: from,
                trigger,
            });
        };
        *state = to;
        tracing::debug!(%from, %trigger, %to, "session transition");
        Ok(to)
    }

    /// Puts the machine back in [`SessionState::Start`].
    ///
    /// Called whenever the connection is torn down. This is also the only
    /// way out of [`SessionState::End`].
    pub fn reset(&self) {
        let mut state = self.lock();
        let from = *state;
        if from != SessionState::Start {
            tracing::debug!(%from, "session reset");
        }
        *state = SessionState::Start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_machine_starts_in_start() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), SessionState::Start);
    }

    #[test]
    fn test_fire_moves_state() {
        let sm = StateMachine::new();
        assert_eq!(sm.fire(Trigger::ClientLogin).unwrap(), SessionState::Lobby);
        assert_eq!(sm.current(), SessionState::Lobby);
    }

    #[test]
    fn test_invalid_fire_leaves_state_unchanged() {
        let sm = StateMachine::new();
        sm.fire(Trigger::ClientLogin).unwrap();

        let err = sm.fire(Trigger::ClientRollDice).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                state: SessionState::Lobby,
                trigger: Trigger::ClientRollDice,
            }
        ));
        assert_eq!(sm.current(), SessionState::Lobby);
    }

    #[test]
    fn test_can_fire_matches_fire() {
        let sm = StateMachine::new();
        assert!(sm.can_fire(Trigger::ClientLogin));
        assert!(sm.can_fire(Trigger::ClientReconnect));
        assert!(!sm.can_fire(Trigger::ClientCreateGame));
        assert!(sm.fire(Trigger::ClientCreateGame).is_err());
    }

    #[test]
    fn test_reset_leaves_end() {
        let sm = StateMachine::new();
        sm.fire(Trigger::ClientLogin).unwrap();
        sm.fire(Trigger::ClientLogout).unwrap();
        assert_eq!(sm.current(), SessionState::End);
        assert!(!sm.can_fire(Trigger::ServerPingPlayer));

        sm.reset();
        assert_eq!(sm.current(), SessionState::Start);
        assert!(sm.can_fire(Trigger::ClientLogin));
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;

        let sm = Arc::new(StateMachine::new());
        sm.fire(Trigger::ClientLogin).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sm = Arc::clone(&sm);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        sm.fire(Trigger::ServerPingPlayer).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sm.current(), SessionState::Lobby);
    }
}
