//! Local file source for testing without network.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(not(unix))]
use std::sync::Mutex;

use super::source::{RandomAccessSource, StreamingResult};

/// Local file source for exercising chunked streaming without a network.
///
/// This source reads from a local file through the same positional interface as
/// `HttpRangeSource`, which makes it useful for tests, benches and development.
/// On Unix the reads are positional (`pread`) and run fully in parallel; elsewhere
/// they are serialized through a seek-and-read behind a mutex.
pub struct LocalFileSource {
    path: PathBuf,
    id: String,
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: Mutex<File>,
    size: u64,
}

impl LocalFileSource {
    /// Opens a local file as a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its size cannot be determined.
    pub fn open<P: AsRef<Path>>(path: P) -> StreamingResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        let id = path.display().to_string();

        Ok(Self {
            path,
            id,
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: Mutex::new(file),
            size,
        })
    }

    /// Returns the path to the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    fn read_once(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(not(unix))]
    fn read_once(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("mutex poisoned"))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }
}

impl RandomAccessSource for LocalFileSource {
    fn total_size(&self) -> StreamingResult<u64> {
        Ok(self.size)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> StreamingResult<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let mut filled = 0;
        while filled < buf.len() {
            match self.read_once(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filled)
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_local_source_read_at() {
        let mut temp = NamedTempFile::new().unwrap();
        let data = b"Hello, World! This is test data for streaming.";
        temp.write_all(data).unwrap();
        temp.flush().unwrap();

        let source = LocalFileSource::open(temp.path()).unwrap();

        assert_eq!(source.total_size().unwrap(), data.len() as u64);

        let mut buf = [0u8; 5];
        assert_eq!(source.read_at(&mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"Hello");

        let mut buf = [0u8; 6];
        assert_eq!(source.read_at(&mut buf, 7).unwrap(), 6);
        assert_eq!(&buf, b"World!");

        let mut buf = [0u8; 10];
        let tail = data.len() as u64 - 10;
        assert_eq!(source.read_at(&mut buf, tail).unwrap(), 10);
        assert_eq!(&buf, b"streaming.");
    }

    #[test]
    fn test_local_source_empty_read() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"test").unwrap();
        temp.flush().unwrap();

        let source = LocalFileSource::open(temp.path()).unwrap();

        let mut buf = [0u8; 0];
        assert_eq!(source.read_at(&mut buf, 0).unwrap(), 0);
        assert_eq!(source.source_id(), temp.path().display().to_string());
    }

    #[test]
    fn test_local_source_short_fill_at_end() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"short").unwrap();
        temp.flush().unwrap();

        let source = LocalFileSource::open(temp.path()).unwrap();

        let mut buf = [0u8; 100];
        assert_eq!(source.read_at(&mut buf, 2).unwrap(), 3);
        assert_eq!(&buf[..3], b"ort");

        assert_eq!(source.read_at(&mut buf, 5).unwrap(), 0);
        assert_eq!(source.read_at(&mut buf, 500).unwrap(), 0);
    }
}
