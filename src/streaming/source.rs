//! Trait defining the interface for random-access data sources.

use std::sync::Arc;

use super::error::StreamingError;

/// Result type for streaming operations.
pub type StreamingResult<T> = std::result::Result<T, StreamingError>;

/// Trait for data sources that support positional reads.
///
/// A source is an already-authorized handle on one remote (or local) object.
/// The chunked reader calls [`read_at`](Self::read_at) from several worker
/// threads at once, so implementations must be safe to use concurrently.
pub trait RandomAccessSource: Send + Sync {
    /// Returns the total size of the data source in bytes.
    ///
    /// This is typically fetched via a HEAD request for HTTP sources.
    fn total_size(&self) -> StreamingResult<u64>;

    /// Fills as much of `buf` as possible with bytes starting at `offset`.
    ///
    /// Returns the number of bytes written into `buf`. Reaching the end of the
    /// object before `buf` is full is not an error: the returned count is simply
    /// smaller than `buf.len()`.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize>;

    /// Returns a unique identifier for this source.
    ///
    /// For HTTP sources, this is typically the URL. For local sources, the file path.
    fn source_id(&self) -> &str;
}

impl<S: RandomAccessSource + ?Sized> RandomAccessSource for Arc<S> {
    fn total_size(&self) -> StreamingResult<u64> {
        (**self).total_size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        (**self).read_at(buf, offset)
    }

    fn source_id(&self) -> &str {
        (**self).source_id()
    }
}

impl<S: RandomAccessSource + ?Sized> RandomAccessSource for Box<S> {
    fn total_size(&self) -> StreamingResult<u64> {
        (**self).total_size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        (**self).read_at(buf, offset)
    }

    fn source_id(&self) -> &str {
        (**self).source_id()
    }
}

impl<S: RandomAccessSource + ?Sized> RandomAccessSource for &S {
    fn total_size(&self) -> StreamingResult<u64> {
        (**self).total_size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        (**self).read_at(buf, offset)
    }

    fn source_id(&self) -> &str {
        (**self).source_id()
    }
}

/// Copies the part of `data` that starts at `offset` into `buf`.
///
/// Shared by sources that hold (or have just fetched) a contiguous slice of the
/// object in memory.
pub(crate) fn copy_window(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= data.len() {
        return 0;
    }
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_window_clamps_to_data() {
        let data = b"0123456789";
        let mut buf = [0u8; 4];

        assert_eq!(copy_window(data, &mut buf, 0), 4);
        assert_eq!(&buf, b"0123");

        assert_eq!(copy_window(data, &mut buf, 8), 2);
        assert_eq!(&buf[..2], b"89");

        assert_eq!(copy_window(data, &mut buf, 10), 0);
        assert_eq!(copy_window(data, &mut buf, u64::MAX), 0);
    }
}
