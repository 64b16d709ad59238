//! Message reassembly with a hard size limit.
//!
//! Transports that deliver a message in fragments push them here. The limit is
//! checked as bytes accumulate, before any JSON interpretation.

use crate::error::FramingError;

/// Accumulates fragments into complete messages
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: Vec<u8>,
    limit: usize,
}

impl MessageAssembler {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Append a fragment.
    ///
    /// Returns the complete message when `is_final` is set. On overflow the partial
    /// message is discarded and the caller is expected to close the connection.
    pub fn push(&mut self, fragment: &[u8], is_final: bool) -> Result<Option<Vec<u8>>, FramingError> {
        let size = self.buffer.len() + fragment.len();
        if size > self.limit {
            self.buffer.clear();
            return Err(FramingError::MessageTooBig {
                size,
                limit: self.limit,
            });
        }

        self.buffer.extend_from_slice(fragment);
        if is_final {
            Ok(Some(std::mem::take(&mut self.buffer)))
        } else {
            Ok(None)
        }
    }

    /// Bytes of the message currently being assembled
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(crate::MAX_MESSAGE_BYTES)
    }
}
