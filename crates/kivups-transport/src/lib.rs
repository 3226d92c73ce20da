//! Transport abstraction layer for the KIVUPS client.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches the game server. The protocol layer above only
//! ever sees raw byte chunks; framing them into messages happens in the
//! client crate.
//!
//! # Feature Flags
//!
//! - `tcp` (default): plain TCP transport via `tokio::net`

mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpConnector, DEFAULT_CHUNK_SIZE};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens outgoing connections to a server address.
///
/// The futures are spelled out as `impl Future + Send` (instead of
/// `async fn`) so a generic client can be driven from a spawned task.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection<Error = Self::Error>;
    /// The error type for connect and connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a new connection to `addr` (`host:port`).
    fn connect(
        &self,
        addr: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes all of `data` to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next chunk of bytes from the remote peer.
    ///
    /// A chunk is whatever the stream delivered; it may hold half a
    /// message or several. Returns `Ok(None)` when the peer closed the
    /// stream cleanly.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_timed_out_error_mentions_duration() {
        let err = TransportError::TimedOut(std::time::Duration::from_secs(3));
        assert_eq!(err.to_string(), "no data received for 3s");
    }

    #[test]
    fn test_connect_failed_error_mentions_address() {
        let err = TransportError::ConnectFailed {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
