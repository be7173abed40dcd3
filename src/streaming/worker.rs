//! Fetch loops that fill chunk buffers from the source.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, Receiver, Sender};
use tracing::{debug, error, trace, warn};

use super::controller::Controller;
use super::error::StreamingError;
use super::layout::ChunkLayout;
use super::source::{RandomAccessSource, StreamingResult};

/// One chunk buffer travelling between the task queue, a worker and the reorder slots.
///
/// The buffer is allocated once at `chunk_size` and reused for every chunk
/// that maps to the same slot.
#[derive(Debug)]
pub(crate) struct Chunk {
    index: u64,
    buf: Vec<u8>,
    len: usize,
}

impl Chunk {
    pub(crate) fn new(index: u64, chunk_size: usize) -> Self {
        Self {
            index,
            buf: vec![0u8; chunk_size],
            len: 0,
        }
    }

    pub(crate) fn index(&self) -> u64 {
        self.index
    }

    /// Bytes filled by the last fetch.
    pub(crate) fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Turns a drained chunk into the task for `index`.
    pub(crate) fn recycle(mut self, index: u64) -> Self {
        self.index = index;
        self.len = 0;
        self
    }
}

/// A single fetch loop.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) source: Arc<dyn RandomAccessSource>,
    pub(crate) layout: ChunkLayout,
    pub(crate) tasks: Receiver<Chunk>,
    pub(crate) results: Sender<Chunk>,
    pub(crate) controller: Arc<Controller>,
}

impl Worker {
    /// Runs until the task queue closes, the stream is cancelled, or a fetch fails.
    pub(crate) fn run(self) {
        debug!(worker = self.id, source = self.source.source_id(), "chunk worker started");
        let _guard = PanicGuard {
            worker: self.id,
            controller: &self.controller,
        };
        let cancelled = self.controller.token().signal();

        loop {
            let mut chunk = select! {
                recv(self.tasks) -> task => match task {
                    Ok(chunk) => chunk,
                    Err(_) => break,
                },
                recv(cancelled) -> _ => break,
            };
            if self.controller.token().is_cancelled() {
                break;
            }

            if let Err(err) = self.fetch(&mut chunk) {
                warn!(worker = self.id, chunk = chunk.index, error = %err, "chunk fetch failed");
                self.controller.fail(err);
                break;
            }

            select! {
                send(self.results, chunk) -> res => {
                    if res.is_err() {
                        break;
                    }
                },
                recv(cancelled) -> _ => break,
            }
        }

        debug!(worker = self.id, "chunk worker exiting");
    }

    fn fetch(&self, chunk: &mut Chunk) -> StreamingResult<()> {
        let offset = self.layout.chunk_offset(chunk.index);
        let expected = self.layout.chunk_len(chunk.index);

        let filled = self
            .source
            .read_at(&mut chunk.buf[..expected], offset)
            .map_err(|err| StreamingError::SourceFetch {
                chunk: chunk.index,
                offset,
                source: Box::new(err),
            })?;

        if filled < expected {
            return Err(StreamingError::ShortChunk {
                chunk: chunk.index,
                expected,
                actual: filled,
            });
        }

        chunk.len = filled;
        trace!(worker = self.id, chunk = chunk.index, offset, len = filled, "chunk fetched");
        Ok(())
    }
}

/// Latches [`StreamingError::WorkerPanicked`] if the worker unwinds, so the
/// reader never waits on a chunk that will not arrive.
struct PanicGuard<'a> {
    worker: usize,
    controller: &'a Controller,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(worker = self.worker, "chunk worker panicked");
            self.controller.fail(StreamingError::WorkerPanicked { worker: self.worker });
        }
    }
}
