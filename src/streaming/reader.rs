//! Sequential reader over chunks fetched in parallel.

use std::fmt;
use std::io;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::config::ChunkReaderConfig;
use super::controller::{Controller, Outcome, StreamState};
use super::error::StreamingError;
use super::layout::ChunkLayout;
use super::source::{RandomAccessSource, StreamingResult};
use super::worker::{Chunk, Worker};

/// Sequential byte stream over an object fetched as parallel range chunks.
///
/// Construction spawns one worker thread per reorder slot. Workers pull chunk
/// tasks from a bounded queue, fill them from the source, and push them onto a
/// bounded result queue in whatever order the fetches complete. Reads drain the
/// chunks strictly by index and hand every drained buffer back to the task queue
/// as the chunk `worker_count` positions further on, so at most `worker_count`
/// chunk buffers exist for the lifetime of the stream.
///
/// Reads may be issued from several threads; they are serialized internally.
/// The first failure anywhere (a source error, a short chunk, cancellation, or
/// [`close`](Self::close)) is latched and returned by every later read.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use blobstream::{ChunkReaderConfig, MemorySource, ParallelChunkReader};
///
/// let source = MemorySource::new("mem://demo", b"ABCDEFGHIJABCDEFGHIJ".to_vec());
/// let mut reader = ParallelChunkReader::from_source(source, ChunkReaderConfig::new(2, 4))?;
///
/// let mut out = String::new();
/// reader.read_to_string(&mut out)?;
/// assert_eq!(out, "ABCDEFGHIJABCDEFGHIJ");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ParallelChunkReader {
    layout: ChunkLayout,
    source_id: String,
    controller: Arc<Controller>,
    results: Receiver<Chunk>,
    cursor: Mutex<Cursor>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    delivered: AtomicU64,
}

/// Reorder slots and read position, guarded by the cursor mutex.
struct Cursor {
    slots: Vec<Option<Chunk>>,
    next_index: u64,
    offset: usize,
    /// `None` once the final task has been queued.
    tasks: Option<Sender<Chunk>>,
}

impl ParallelChunkReader {
    /// Creates a stream over the first `total_len` bytes of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::InvalidArgument`] if `total_len` is zero, or
    /// [`StreamingError::Io`] if a worker thread cannot be spawned.
    pub fn new<S>(source: S, total_len: u64, config: ChunkReaderConfig) -> StreamingResult<Self>
    where
        S: RandomAccessSource + 'static,
    {
        Self::with_cancel(&CancelToken::new(), source, total_len, config)
    }

    /// Creates a stream sized by the source's own [`total_size`](RandomAccessSource::total_size).
    ///
    /// # Errors
    ///
    /// Fails if the size cannot be determined or is zero.
    pub fn from_source<S>(source: S, config: ChunkReaderConfig) -> StreamingResult<Self>
    where
        S: RandomAccessSource + 'static,
    {
        let total_len = source.total_size()?;
        Self::new(source, total_len, config)
    }

    /// Creates a stream whose lifetime is bounded by `parent`.
    ///
    /// Cancelling `parent` fails every pending and future read with
    /// [`StreamingError::Cancelled`]. Failures inside the stream never cancel `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::InvalidArgument`] if `total_len` is zero; no
    /// thread is started in that case.
    pub fn with_cancel<S>(
        parent: &CancelToken,
        source: S,
        total_len: u64,
        config: ChunkReaderConfig,
    ) -> StreamingResult<Self>
    where
        S: RandomAccessSource + 'static,
    {
        let layout = ChunkLayout::new(
            total_len,
            config.effective_chunk_size(),
            config.effective_parallelism(),
        )?;
        let source: Arc<dyn RandomAccessSource> = Arc::new(source);
        let source_id = source.source_id().to_owned();
        let controller = Arc::new(Controller::new(parent.child_token()));

        let workers = layout.worker_count();
        let (task_tx, task_rx) = crossbeam_channel::bounded(workers);
        let (result_tx, result_rx) = crossbeam_channel::bounded(workers);

        // Chunk 0 is never shorter than any other chunk.
        let buffer_len = layout.chunk_len(0);
        for index in 0..workers as u64 {
            task_tx
                .try_send(Chunk::new(index, buffer_len))
                .map_err(|_| io::Error::other("task queue rejected a seed chunk"))?;
        }
        // Every chunk already has a task when there is one chunk per worker.
        let tasks = (layout.chunk_count() > workers as u64).then_some(task_tx);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker {
                id,
                source: Arc::clone(&source),
                layout,
                tasks: task_rx.clone(),
                results: result_tx.clone(),
                controller: Arc::clone(&controller),
            };
            let spawned = thread::Builder::new()
                .name(format!("blobstream-worker-{id}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    let err = StreamingError::from(err);
                    controller.fail(err.clone());
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }

        debug!(
            source = %source_id,
            total_len,
            chunk_size = layout.chunk_size(),
            chunks = layout.chunk_count(),
            workers,
            "parallel chunk reader started"
        );

        Ok(Self {
            layout,
            source_id,
            controller,
            results: result_rx,
            cursor: Mutex::new(Cursor {
                slots: (0..workers).map(|_| None).collect(),
                next_index: 0,
                offset: 0,
                tasks,
            }),
            workers: Mutex::new(handles),
            delivered: AtomicU64::new(0),
        })
    }

    /// Copies the next sequential bytes of the object into `buf`.
    ///
    /// Returns the number of bytes copied, which may be less than `buf.len()`.
    /// `Ok(0)` means every byte has been delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StreamingError::InvalidArgument`] for an empty `buf`, otherwise
    /// the error latched by the stream (the same one on every call).
    pub fn read(&self, buf: &mut [u8]) -> StreamingResult<usize> {
        if buf.is_empty() {
            return Err(StreamingError::invalid_argument("read buffer must not be empty"));
        }
        if let Some(outcome) = self.controller.outcome() {
            return outcome.read_result();
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        // Another reader may have ended the stream while this one waited for the lock.
        if let Some(outcome) = self.controller.outcome() {
            return outcome.read_result();
        }

        let index = cursor.next_index;
        let slot = self.layout.slot(index);
        let cancelled = self.controller.token().signal();

        let chunk = loop {
            if let Some(chunk) = cursor.slots[slot].take() {
                break chunk;
            }
            select! {
                recv(self.results) -> msg => match msg {
                    Ok(chunk) => {
                        if self.controller.token().is_cancelled() {
                            return self.abort(StreamingError::Cancelled);
                        }
                        let arrived = self.layout.slot(chunk.index());
                        cursor.slots[arrived] = Some(chunk);
                    }
                    Err(_) => return self.abort(StreamingError::Cancelled),
                },
                recv(cancelled) -> _ => return self.abort(StreamingError::Cancelled),
            }
        };

        let data = &chunk.data()[cursor.offset..];
        let n = buf.len().min(data.len());
        buf[..n].copy_from_slice(&data[..n]);
        cursor.offset += n;

        if cursor.offset < chunk.data().len() {
            cursor.slots[slot] = Some(chunk);
            self.delivered.fetch_add(n as u64, Ordering::Relaxed);
            return Ok(n);
        }

        cursor.offset = 0;
        if let Some(next) = self.layout.successor(index) {
            // The sender is released only after the final chunk has been queued.
            let Some(tasks) = cursor.tasks.as_ref() else {
                let err = io::Error::other(format!("task queue closed before chunk {next}"));
                return self.abort(err.into());
            };
            let task = chunk.recycle(next);
            let queued = select! {
                send(tasks, task) -> res => res.is_ok(),
                recv(cancelled) -> _ => false,
            };
            if !queued {
                return self.abort(StreamingError::Cancelled);
            }
            if self.layout.is_last(next) {
                cursor.tasks = None;
            }
        }

        if self.layout.is_last(index) {
            self.controller.finish();
            debug!(source = %self.source_id, total_len = self.layout.total_len(), "stream exhausted");
        }
        cursor.next_index += 1;
        // Counted only once the bytes are certain to reach the caller.
        self.delivered.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    /// Ends the stream, stops the workers and waits for them to exit.
    ///
    /// Closing a stream that already delivered every byte succeeds. Closing an
    /// active stream latches [`StreamingError::ClosedByCaller`], which is returned
    /// here and by every pending or later read. Closing a stream that already
    /// failed returns that failure.
    ///
    /// A worker blocked inside the source is only joined once its fetch returns.
    ///
    /// # Errors
    ///
    /// Returns the latched error unless the stream was exhausted.
    pub fn close(&self) -> StreamingResult<()> {
        let outcome = self.controller.fail(StreamingError::ClosedByCaller);

        let handles = mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        let joined = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                warn!(source = %self.source_id, "chunk worker panicked");
            }
        }
        debug!(source = %self.source_id, workers = joined, state = ?self.state(), "stream closed");

        match outcome {
            Outcome::Exhausted => Ok(()),
            Outcome::Failed(err) => Err(err.clone()),
        }
    }

    /// Latches `err` unless something else already ended the stream, and reports
    /// whatever won.
    fn abort(&self, err: StreamingError) -> StreamingResult<usize> {
        self.controller.fail(err).read_result()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.controller.state()
    }

    /// Number of bytes delivered to readers so far.
    ///
    /// After a failure this is the offset a fresh stream would resume from.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Chunk arithmetic of this stream.
    #[must_use]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Total object length in bytes.
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.layout.total_len()
    }

    /// Chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.layout.chunk_size()
    }

    /// Number of chunks.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        self.layout.chunk_count()
    }

    /// Number of worker threads (and chunk buffers).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.layout.worker_count()
    }

    /// Identifier of the underlying source.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Token that cancels this stream only.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.controller.token().clone()
    }
}

impl io::Read for &ParallelChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        ParallelChunkReader::read(*self, buf).map_err(io::Error::from)
    }
}

impl io::Read for ParallelChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut this: &ParallelChunkReader = self;
        io::Read::read(&mut this, buf)
    }
}

impl Drop for ParallelChunkReader {
    fn drop(&mut self) {
        // Workers are not joined here: one may be blocked inside the source.
        self.controller.fail(StreamingError::ClosedByCaller);
    }
}

impl fmt::Debug for ParallelChunkReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelChunkReader")
            .field("source_id", &self.source_id)
            .field("layout", &self.layout)
            .field("state", &self.state())
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}
