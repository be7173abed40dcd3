//! Chunk arithmetic for one stream: how many chunks, how many workers, where each chunk lives.

use super::error::StreamingError;
use super::source::StreamingResult;

/// The parallelism window of a chunked stream.
///
/// The object is split into `chunk_count` chunks of `chunk_size` bytes (the last
/// one may be shorter). `worker_count` is the configured parallelism clamped to
/// `1..=chunk_count`, and it is also the number of reorder slots: chunk `i`
/// always lands in slot `i % worker_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    total_len: u64,
    chunk_size: usize,
    chunk_count: u64,
    worker_count: usize,
}

impl ChunkLayout {
    /// Computes the layout for an object of `total_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::InvalidArgument`] if `total_len` or `chunk_size` is zero.
    pub fn new(total_len: u64, chunk_size: usize, parallelism: usize) -> StreamingResult<Self> {
        if total_len == 0 {
            return Err(StreamingError::invalid_argument("total length must be > 0"));
        }
        if chunk_size == 0 {
            return Err(StreamingError::invalid_argument("chunk size must be > 0"));
        }

        let chunk_count = (total_len - 1) / chunk_size as u64 + 1;
        let worker_count = usize::try_from(chunk_count)
            .unwrap_or(usize::MAX)
            .min(parallelism)
            .max(1);

        Ok(Self {
            total_len,
            chunk_size,
            chunk_count,
            worker_count,
        })
    }

    /// Total object length in bytes.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Nominal size of every chunk but the last.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks the object is split into.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Number of workers, reorder slots and chunk buffers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Byte offset of chunk `index`.
    #[must_use]
    pub fn chunk_offset(&self, index: u64) -> u64 {
        index * self.chunk_size as u64
    }

    /// Number of bytes chunk `index` must hold.
    #[must_use]
    pub fn chunk_len(&self, index: u64) -> usize {
        let remaining = self.total_len.saturating_sub(self.chunk_offset(index));
        usize::try_from(remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size))
    }

    /// Reorder slot that holds chunk `index`.
    #[must_use]
    pub fn slot(&self, index: u64) -> usize {
        // worker_count <= chunk_count, so the remainder always fits.
        (index % self.worker_count as u64) as usize
    }

    /// Returns `true` if `index` is the final chunk.
    #[must_use]
    pub fn is_last(&self, index: u64) -> bool {
        index + 1 == self.chunk_count
    }

    /// Index of the chunk that reuses `index`'s buffer once it is drained, if any.
    #[must_use]
    pub fn successor(&self, index: u64) -> Option<u64> {
        let next = index + self.worker_count as u64;
        (next < self.chunk_count).then_some(next)
    }
}
