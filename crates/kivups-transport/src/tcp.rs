//! TCP transport implementation using `tokio::net`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Connector, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How many bytes a single `recv` asks the socket for.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// A [`Connector`] that dials plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    chunk_size: usize,
}

impl TcpConnector {
    /// Creates a connector that reads [`DEFAULT_CHUNK_SIZE`] bytes at a time.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the read chunk size. Zero is bumped to one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpConnector {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn connect(&self, addr: &str) -> Result<TcpConnection, TransportError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| {
            TransportError::ConnectFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        // Frames are tiny and latency matters more than throughput.
        let _ = stream.set_nodelay(true);

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, addr, "opened TCP connection");

        let (reader, writer) = stream.into_split();
        Ok(TcpConnection {
            id,
            chunk_size: self.chunk_size,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }
}

/// A single TCP connection.
///
/// The two halves sit behind separate locks so a pending read never
/// blocks a write.
pub struct TcpConnection {
    id: ConnectionId,
    chunk_size: usize,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self
            .reader
            .lock()
            .await
            .read(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn close(&self) -> Result<(), TransportError> {
        tracing::debug!(id = %self.id, "closing TCP connection");
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
