//! Sequential streaming reads of large remote objects, fetched as parallel range chunks.
//!
//! See [`streaming`] for the moving parts. The common types are re-exported here.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![warn(missing_docs)]

pub mod streaming;

pub use streaming::{
    CancelToken, ChunkLayout, ChunkReaderConfig, LocalFileSource, MemorySource,
    ParallelChunkReader, RandomAccessSource, StreamState, StreamingError, StreamingResult,
};

#[cfg(feature = "http")]
pub use streaming::{open_url, HttpAuthConfig, HttpConfig, HttpRangeSource};
