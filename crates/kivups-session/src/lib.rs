//! Client session state for the KIVUPS protocol.
//!
//! The server only accepts a command when the player is in the right
//! place in the game flow. This crate mirrors that flow on the client:
//!
//! 1. **States**: where the player is ([`SessionState`])
//! 2. **Transitions**: which trigger moves where ([`SessionState::target`])
//! 3. **Machine**: the shared, lock-guarded current state ([`StateMachine`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← fires a trigger for every accepted command, both ways
//!     ↕
//! Session Layer (this crate)  ← decides whether that trigger is legal now
//!     ↕
//! Protocol Layer (below)  ← provides the Trigger names
//! ```

mod error;
mod machine;
mod state;

pub use error::SessionError;
pub use machine::StateMachine;
pub use state::SessionState;
