//! Splits the inbound byte stream into `\n`-terminated frames.
//!
//! TCP has no message boundaries: one read can return half a frame, or
//! one and a half. Whatever follows the first terminator stays buffered
//! and is served before the socket is read again.

use kivups_protocol::{ProtocolError, TERMINATOR};

/// Accumulates raw bytes and hands out complete frames.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_frame_size: usize,
}

impl FrameBuffer {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_size,
        }
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete frame, terminator included.
    ///
    /// Returns `Ok(None)` while the buffered data holds no terminator.
    ///
    /// # Errors
    /// [`ProtocolError::FrameTooLarge`] if a frame (complete or not) is
    /// longer than the limit. The stream cannot be resynchronised after
    /// that, so the caller should drop the connection.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match self.buf.iter().position(|&b| b == TERMINATOR) {
            Some(end) if end + 1 > self.max_frame_size => {
                Err(ProtocolError::FrameTooLarge(self.max_frame_size))
            }
            Some(end) => Ok(Some(self.buf.drain(..=end).collect())),
            None if self.buf.len() > self.max_frame_size => {
                Err(ProtocolError::FrameTooLarge(self.max_frame_size))
            }
            None => Ok(None),
        }
    }

    /// Returns `true` if a complete frame is waiting.
    pub fn has_frame(&self) -> bool {
        self.buf.contains(&TERMINATOR)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut frames = FrameBuffer::new(64);
        frames.extend(b"abc\n");
        assert_eq!(frames.next_frame().unwrap(), Some(b"abc\n".to_vec()));
        assert!(frames.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_rest() {
        let mut frames = FrameBuffer::new(64);
        frames.extend(b"ab");
        assert_eq!(frames.next_frame().unwrap(), None);
        frames.extend(b"c\nde");
        assert_eq!(frames.next_frame().unwrap(), Some(b"abc\n".to_vec()));
        assert_eq!(frames.next_frame().unwrap(), None);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let mut frames = FrameBuffer::new(64);
        frames.extend(b"one\ntwo\n");
        assert!(frames.has_frame());
        assert_eq!(frames.next_frame().unwrap(), Some(b"one\n".to_vec()));
        assert_eq!(frames.next_frame().unwrap(), Some(b"two\n".to_vec()));
        assert!(!frames.has_frame());
    }

    #[test]
    fn test_unterminated_data_over_limit_fails() {
        let mut frames = FrameBuffer::new(4);
        frames.extend(b"abcde");
        assert!(matches!(
            frames.next_frame(),
            Err(ProtocolError::FrameTooLarge(4))
        ));
    }

    #[test]
    fn test_terminated_frame_over_limit_fails() {
        let mut frames = FrameBuffer::new(4);
        frames.extend(b"abcd\n");
        assert!(frames.next_frame().is_err());
    }

    #[test]
    fn test_frame_exactly_at_limit_passes() {
        let mut frames = FrameBuffer::new(4);
        frames.extend(b"abc\n");
        assert!(frames.next_frame().unwrap().is_some());
    }

    #[test]
    fn test_clear() {
        let mut frames = FrameBuffer::new(8);
        frames.extend(b"xy");
        frames.clear();
        assert!(frames.is_empty());
    }
}
