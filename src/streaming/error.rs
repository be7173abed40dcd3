//! Error types for streaming operations.

use std::borrow::Cow;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur while fetching ranges or draining a chunked stream.
///
/// The type is `Clone` so that a single latched failure can be handed to every
/// reader of a stream. Causes that are not `Clone` themselves are wrapped in `Arc`.
#[derive(Debug, Clone, Error)]
pub enum StreamingError {
    /// HTTP error response from the server.
    #[error("HTTP error: {status} - {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error message or response body
        message: String,
    },

    /// Server does not support HTTP range requests.
    #[error("Server does not support range requests (missing Accept-Ranges: bytes header)")]
    RangeNotSupported,

    /// Network error during HTTP request.
    #[cfg(feature = "http")]
    #[error("Network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout in seconds
        timeout_secs: u64,
    },

    /// Resource not found (HTTP 404).
    #[error("Resource not found: {url}")]
    NotFound {
        /// URL that was not found
        url: String,
    },

    /// I/O error when reading from a local source.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The data source returned fewer bytes than expected.
    #[error("Unexpected end of data: expected {expected} bytes, got {actual}")]
    UnexpectedEndOfData {
        /// Expected number of bytes
        expected: u64,
        /// Actual number of bytes received
        actual: u64,
    },

    /// The source failed while a worker was fetching a chunk.
    #[error("Fetching chunk {chunk} at offset {offset} failed: {source}")]
    SourceFetch {
        /// Index of the chunk being fetched
        chunk: u64,
        /// Byte offset of the chunk
        offset: u64,
        /// The error reported by the source
        #[source]
        source: Box<StreamingError>,
    },

    /// The source filled less of a chunk than the object length implies.
    #[error("Chunk {chunk} is short: expected {expected} bytes, got {actual}")]
    ShortChunk {
        /// Index of the short chunk
        chunk: u64,
        /// Bytes the chunk should hold
        expected: usize,
        /// Bytes the source actually filled
        actual: usize,
    },

    /// A worker thread panicked while fetching a chunk.
    #[error("Chunk worker {worker} panicked")]
    WorkerPanicked {
        /// Id of the worker that panicked
        worker: usize,
    },

    /// A constructor or read call was given an unusable argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument
        reason: Cow<'static, str>,
    },

    /// The execution context of the stream was cancelled.
    #[error("Stream was cancelled")]
    Cancelled,

    /// The stream was closed before all bytes were delivered.
    #[error("Stream closed by caller")]
    ClosedByCaller,
}

impl StreamingError {
    /// Creates an [`StreamingError::InvalidArgument`] from a static or owned reason.
    pub fn invalid_argument(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns `true` for failures worth retrying at the transport layer.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Network(_) => true,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<io::Error> for StreamingError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for StreamingError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Arc::new(err))
    }
}

impl From<StreamingError> for io::Error {
    fn from(err: StreamingError) -> Self {
        let kind = match &err {
            StreamingError::InvalidArgument { .. } => io::ErrorKind::InvalidInput,
            StreamingError::NotFound { .. } => io::ErrorKind::NotFound,
            StreamingError::Timeout { .. } => io::ErrorKind::TimedOut,
            StreamingError::UnexpectedEndOfData { .. } | StreamingError::ShortChunk { .. } => {
                io::ErrorKind::UnexpectedEof
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn source_fetch_exposes_cause() {
        let err = StreamingError::SourceFetch {
            chunk: 3,
            offset: 12,
            source: Box::new(StreamingError::NotFound {
                url: "http://example.test/blob".into(),
            }),
        };

        assert!(err.to_string().contains("chunk 3"));
        let cause = err.source().expect("cause");
        assert!(cause.to_string().contains("example.test"));
    }

    #[test]
    fn io_conversion_keeps_kind() {
        let err: io::Error = StreamingError::invalid_argument("empty buffer").into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err: io::Error = StreamingError::ClosedByCaller.into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        let inner = err
            .get_ref()
            .and_then(|e| e.downcast_ref::<StreamingError>())
            .expect("wrapped streaming error");
        assert!(matches!(inner, StreamingError::ClosedByCaller));
    }

    #[test]
    fn clones_share_io_cause() {
        let err = StreamingError::from(io::Error::other("disk gone"));
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        assert!(!copy.is_transient());
        assert!(StreamingError::Timeout { timeout_secs: 1 }.is_transient());
    }
}
