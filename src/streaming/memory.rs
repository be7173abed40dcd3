//! In-memory source.

use std::sync::Arc;

use super::source::{copy_window, RandomAccessSource, StreamingResult};

/// A source backed by bytes already held in memory.
///
/// Cheap to clone; clones share the same buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
    id: String,
}

impl MemorySource {
    /// Wraps `data` as a source identified by `id`.
    pub fn new(id: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            id: id.into(),
        }
    }

    /// Returns the wrapped bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl RandomAccessSource for MemorySource {
    fn total_size(&self) -> StreamingResult<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        Ok(copy_window(&self.data, buf, offset))
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}
