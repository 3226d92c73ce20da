//! # kivups-client
//!
//! Network core of the KIVUPS dice game client.
//!
//! The UI talks to one [`Dispatcher`]: it logs in, creates or joins games,
//! rolls and selects cubes, and lets a [`Page`] listen for server pushes
//! in the background. Underneath, the dispatcher keeps a single TCP
//! connection, validates every frame against the session state and hides
//! the server's keepalive pings.
//!
//! ```text
//! UI ──calls──→ Dispatcher ──exchange──→ ConnectionManager ──bytes──→ server
//!  ↑                 │                        │
//!  └──Update──── Page listener ←──frames──────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kivups_client::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let client = Dispatcher::builder().build();
//! let games = match client.login(DEFAULT_SERVER_ADDR, "Alice123").await? {
//!     Outcome::Connected(games) => games,
//!     Outcome::Resumed(_) | Outcome::Disconnected => return Ok(()),
//! };
//! println!("{} games open", games.len());
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod dispatcher;
mod error;
mod framing;
mod listen;
mod outcome;

pub use config::{ClientConfig, DEFAULT_SERVER_ADDR};
pub use connection::{ConnectionManager, Exchange, ReadMode};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::ClientError;
pub use framing::FrameBuffer;
pub use listen::{
    listen, receive_batch, BeforeGamePage, Flow, ListenExit, LobbyPage, Page, RunningGamePage,
    TurnPage, Update,
};
pub use outcome::{Outcome, Resume, RollResult, SelectionResult};

/// Everything a front-end usually needs.
pub mod prelude {
    pub use crate::{
        BeforeGamePage, ClientConfig, ClientError, Dispatcher, Flow, ListenExit, LobbyPage,
        Outcome, Page, Resume, RollResult, RunningGamePage, SelectionResult, TurnPage, Update,
        DEFAULT_SERVER_ADDR,
    };
    pub use kivups_protocol::{CubeRoll, GameSummary, Player, PlayerTurnState};
    pub use kivups_session::SessionState;
}
