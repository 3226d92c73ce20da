//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the demo front-end connects when no address is given.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:10000";

/// Timeouts, retry policy and buffer limits for one client.
///
/// The defaults match what the game server expects from a well-behaved
/// client: it pings every few seconds, so ten silent seconds mean the
/// link is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long a blocking read waits, and how long the link may stay
    /// silent while a page is listening, before it counts as lost.
    pub read_timeout: Duration,

    /// How long one listen poll waits for the first frame of a batch.
    /// Running out of time here is normal and not an error.
    pub poll_interval: Duration,

    /// How many times to try reopening a lost connection.
    pub reconnect_attempts: u32,

    /// Pause before each reconnect attempt.
    pub reconnect_backoff: Duration,

    /// Bytes requested from the socket per read.
    pub read_chunk_size: usize,

    /// Longest frame accepted before the stream counts as garbage.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            reconnect_attempts: 5,
            reconnect_backoff: Duration::from_secs(2),
            read_chunk_size: 1024,
            max_frame_size: 4096,
        }
    }
}

impl ClientConfig {
    /// Bumps zero durations and sizes up to the smallest usable value.
    pub fn validated(mut self) -> Self {
        let min = Duration::from_millis(1);
        self.read_timeout = self.read_timeout.max(min);
        self.poll_interval = self.poll_interval.max(min);
        self.read_chunk_size = self.read_chunk_size.max(1);
        self.max_frame_size = self.max_frame_size.max(1);
        self
    }
}
