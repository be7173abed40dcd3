//! Parallel chunked streaming over random-access sources.
//!
//! A [`ParallelChunkReader`] turns any [`RandomAccessSource`] (an HTTP object
//! that accepts range requests, a local file, a byte buffer) into one sequential
//! byte stream. Internally the object is split into fixed-size chunks that a
//! small pool of worker threads fetches concurrently; a reorder ring puts the
//! chunks back in order before any byte reaches the caller.
//!
//! # Features
//!
//! - **Lower latency**: several range requests are in flight at once
//! - **Bounded memory**: one chunk buffer per worker, recycled for the whole stream
//! - **Strict ordering**: bytes come out in object order regardless of completion order
//! - **Fail fast**: the first error is latched and every blocked party is woken
//!
//! # Example
//!
//! ```ignore
//! use std::io;
//! use blobstream::streaming::{open_url, ChunkReaderConfig, HttpConfig};
//!
//! let config = ChunkReaderConfig::default().with_parallelism(8);
//! let mut reader = open_url("https://cdn.example.com/large.bin", HttpConfig::default(), config)?;
//! io::copy(&mut reader, &mut io::stdout())?;
//! reader.close()?;
//! ```

mod cancel;
mod config;
mod controller;
mod error;
#[cfg(feature = "http")]
mod http;
mod layout;
mod local;
mod memory;
mod reader;
mod source;
mod worker;

pub use cancel::CancelToken;
pub use config::{ChunkReaderConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PARALLELISM};
pub use controller::StreamState;
pub use error::StreamingError;
#[cfg(feature = "http")]
pub use http::{open_url, HttpAuthConfig, HttpConfig, HttpRangeSource};
pub use layout::ChunkLayout;
pub use local::LocalFileSource;
pub use memory::MemorySource;
pub use reader::ParallelChunkReader;
pub use source::{RandomAccessSource, StreamingResult};
