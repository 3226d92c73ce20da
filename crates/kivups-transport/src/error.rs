use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// Every variant here means the byte stream itself is unusable. The
/// client treats all of them the same way: tear the link down and let
/// the reconnect policy decide what happens next.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed (by the peer, or locally).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Opening the connection failed.
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Nothing arrived from the peer for longer than the idle timeout.
    #[error("no data received for {0:?}")]
    TimedOut(Duration),
}
