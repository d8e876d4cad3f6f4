//! Line framing for a connection's input stream.
//!
//! Bytes accumulate until the buffer holds at least one `\n` or the peer
//! closes its write side. At that point the whole buffer, including any text
//! after the last newline, is released as one batch and the buffer is
//! cleared. There is no upper bound on how much is buffered.

use bytes::BytesMut;
use std::fmt;

/// Initial read buffer capacity
const BUFFER_SIZE: usize = 4 * 1024;

/// A batch of text that was not valid UTF-8.
#[derive(Debug)]
pub struct DecodeError(std::str::Utf8Error);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid UTF-8 in request: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Per-connection accumulating buffer.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(BUFFER_SIZE),
        }
    }

    /// Append a chunk and release a batch if a newline is now buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Batch>, DecodeError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.contains(&b'\n') {
            self.take().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> Result<Option<Batch>, DecodeError> {
        if self.buffer.is_empty() {
            Ok(None)
        } else {
            self.take().map(Some)
        }
    }

    fn take(&mut self) -> Result<Batch, DecodeError> {
        let bytes = self.buffer.split().freeze();
        let text = std::str::from_utf8(&bytes).map_err(DecodeError)?;
        Ok(Batch(text.to_string()))
    }
}

/// Text released by the framer in one flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch(String);

impl Batch {
    /// Lines of the batch in order, split on `\n`.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.split('\n')
    }
}
