//! Configuration for chunked streaming.

use serde::{Deserialize, Serialize};

/// Default number of bytes fetched per chunk (4 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default number of chunks fetched in parallel.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Configuration for a [`ParallelChunkReader`](super::ParallelChunkReader).
///
/// A zero in either field selects the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkReaderConfig {
    /// Number of bytes to fetch per chunk (default: 4 MiB).
    pub chunk_size: usize,
    /// Number of chunks to fetch in parallel (default: 4).
    pub parallelism: usize,
}

impl Default for ChunkReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl ChunkReaderConfig {
    /// Creates a configuration with explicit chunk size and parallelism.
    #[must_use]
    pub fn new(chunk_size: usize, parallelism: usize) -> Self {
        Self {
            chunk_size,
            parallelism,
        }
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the parallelism.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Chunk size with the default substituted for zero.
    #[must_use]
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }

    /// Parallelism with the default substituted for zero.
    #[must_use]
    pub fn effective_parallelism(&self) -> usize {
        if self.parallelism == 0 {
            DEFAULT_PARALLELISM
        } else {
            self.parallelism
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ChunkReaderConfig::default();
        assert_eq!(config.chunk_size, 4 * 1024 * 1024);
        assert_eq!(config.parallelism, 4);
    }

    #[test]
    fn zero_selects_default() {
        let config = ChunkReaderConfig::new(0, 0);
        assert_eq!(config.effective_chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(config.effective_parallelism(), DEFAULT_PARALLELISM);

        let config = config.with_chunk_size(2).with_parallelism(20);
        assert_eq!(config.effective_chunk_size(), 2);
        assert_eq!(config.effective_parallelism(), 20);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: ChunkReaderConfig = serde_json::from_str(r#"{"parallelism": 8}"#).unwrap();
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
