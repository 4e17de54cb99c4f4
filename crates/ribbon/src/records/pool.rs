//! Parallel Chunk Encoding
//!
//! The writer pipeline: the caller's thread submits filled chunk encoders,
//! `N` worker threads encode them in any order, and one writer thread
//! emits the encoded chunks strictly in submission order, so the file is
//! byte-identical to a synchronous encode.
//!
//! ## Shared state
//!
//! A single mutex guards the submission queue, the reorder buffer, and the
//! latched failure; condition variables signal "queue non-empty", "next
//! chunk in sequence ready", "room for another submission", and "a chunk
//! was emitted". Sequence numbers are assigned at submission; the writer
//! thread only ever takes `next_emit` out of the reorder buffer, which is
//! what enforces ordering despite out-of-order completion.
//!
//! ## Failure and shutdown
//!
//! The first failure, whether a worker's or the writer's, is latched. Workers
//! and the writer wind down, `submit` fails fast, and `close` surfaces the
//! latched error after joining every thread. `close` without a failure is
//! a barrier: it drains the queue and the reorder buffer completely.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use ribbon_core::{Error, Result};

use crate::block::BlockWriter;
use crate::bytes::{FlushKind, Sink};
use crate::chunk::{Chunk, ChunkEncoder, SimpleEncoder};

struct State {
    /// Submitted, not yet picked up by a worker.
    queue: VecDeque<(u64, SimpleEncoder)>,
    /// Encoded, waiting for their turn; the reorder buffer.
    done: BTreeMap<u64, Chunk>,
    /// Sequence number the writer thread emits next.
    next_emit: u64,
    /// Submitted but not yet emitted.
    outstanding: u64,
    max_outstanding: u64,
    failed: Option<Error>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    output_ready: Condvar,
    space_ready: Condvar,
    emitted: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latches the first failure and wakes every waiter.
    fn fail(&self, error: Error) {
        {
            let mut state = self.lock();
            if state.failed.is_none() {
                tracing::debug!(error = %error, "encode pipeline failed");
                state.failed = Some(error);
            }
        }
        self.work_ready.notify_all();
        self.output_ready.notify_all();
        self.space_ready.notify_all();
        self.emitted.notify_all();
    }
}

/// The worker pool plus writer thread behind a parallel record writer.
pub(crate) struct EncoderPool<D: Sink + Send + 'static> {
    shared: Arc<Shared>,
    /// The block writer lives here so the writer thread and `close` can
    /// both reach it; only the writer thread touches it while running.
    dest: Arc<Mutex<Option<BlockWriter<D>>>>,
    workers: Vec<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    next_seq: u64,
}

impl<D: Sink + Send + 'static> EncoderPool<D> {
    pub(crate) fn new(dest: BlockWriter<D>, parallelism: usize) -> Result<Self> {
        assert!(parallelism >= 1, "a pool needs at least one worker");
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                done: BTreeMap::new(),
                next_emit: 0,
                outstanding: 0,
                max_outstanding: (parallelism as u64) * 2,
                failed: None,
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            output_ready: Condvar::new(),
            space_ready: Condvar::new(),
            emitted: Condvar::new(),
        });
        let dest = Arc::new(Mutex::new(Some(dest)));

        let mut workers = Vec::with_capacity(parallelism);
        for i in 0..parallelism {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("ribbon-encoder-{}", i))
                .spawn(move || worker_loop(&shared))
                .map_err(Error::Io)?;
            workers.push(handle);
        }
        let writer = {
            let shared = Arc::clone(&shared);
            let dest = Arc::clone(&dest);
            std::thread::Builder::new()
                .name("ribbon-chunk-writer".to_string())
                .spawn(move || writer_loop(&shared, &dest))
                .map_err(Error::Io)?
        };

        Ok(Self {
            shared,
            dest,
            workers,
            writer: Some(writer),
            next_seq: 0,
        })
    }

    /// Hands a filled encoder to the pool. Blocks while the reorder buffer
    /// is at its outstanding-chunks limit; fails fast once the pipeline
    /// has latched an error.
    pub(crate) fn submit(&mut self, encoder: SimpleEncoder) -> Result<()> {
        let seq = self.next_seq;
        {
            let mut state = self.shared.lock();
            loop {
                if let Some(e) = &state.failed {
                    return Err(e.clone());
                }
                if state.outstanding < state.max_outstanding {
                    break;
                }
                state = self
                    .shared
                    .space_ready
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            state.queue.push_back((seq, encoder));
            state.outstanding += 1;
        }
        self.shared.work_ready.notify_one();
        self.next_seq += 1;
        tracing::trace!(seq, "chunk submitted for encoding");
        Ok(())
    }

    /// Blocks until everything submitted has been emitted.
    fn wait_drained(&self) -> Result<()> {
        let mut state = self.shared.lock();
        loop {
            if let Some(e) = &state.failed {
                return Err(e.clone());
            }
            if state.outstanding == 0 {
                return Ok(());
            }
            state = self
                .shared
                .emitted
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Drains the pipeline, then flushes the downstream stack.
    pub(crate) fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.wait_drained()?;
        let mut guard = self
            .dest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_mut() {
            Some(writer) => writer.flush(kind),
            None => Err(Error::Usage("writer is closed".to_string())),
        }
    }

    fn signal_shutdown_and_join(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        self.shared.output_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }

    fn latched(&self) -> Option<Error> {
        self.shared.lock().failed.clone()
    }

    /// The close barrier: drains the queue and reorder buffer, joins all
    /// threads, closes the downstream, and surfaces any latched failure.
    pub(crate) fn close(&mut self) -> Result<()> {
        self.signal_shutdown_and_join();
        let latched = self.latched();
        let mut guard = self
            .dest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.take() {
            Some(mut writer) => match latched {
                Some(e) => {
                    let _ = writer.close();
                    Err(e)
                }
                None => writer.close(),
            },
            None => latched.map_or(Ok(()), Err),
        }
    }

    /// Like `close`, but hands the underlying sink back unclosed.
    pub(crate) fn into_inner(mut self) -> Result<D> {
        self.signal_shutdown_and_join();
        if let Some(e) = self.latched() {
            return Err(e);
        }
        let mut guard = self
            .dest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.take() {
            Some(writer) => writer.into_inner(),
            None => Err(Error::Usage("writer is closed".to_string())),
        }
    }
}

impl<D: Sink + Send + 'static> Drop for EncoderPool<D> {
    /// Dropping without `close` still releases the threads; buffered
    /// chunks are not guaranteed to reach the sink.
    fn drop(&mut self) {
        if self.writer.is_some() || !self.workers.is_empty() {
            self.signal_shutdown_and_join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if state.failed.is_some() {
                    return;
                }
                if let Some(job) = state.queue.pop_front() {
                    break Some(job);
                }
                if state.shutdown {
                    break None;
                }
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };
        let (seq, mut encoder) = match job {
            Some(job) => job,
            None => return,
        };
        match encoder.encode() {
            Ok(chunk) => {
                let mut state = shared.lock();
                state.done.insert(seq, chunk);
                if seq == state.next_emit {
                    shared.output_ready.notify_all();
                }
            }
            Err(e) => shared.fail(e),
        }
    }
}

fn writer_loop<D: Sink + Send + 'static>(
    shared: &Shared,
    dest: &Mutex<Option<BlockWriter<D>>>,
) {
    loop {
        let (seq, chunk) = {
            let mut state = shared.lock();
            loop {
                if state.failed.is_some() {
                    return;
                }
                let next = state.next_emit;
                if let Some(chunk) = state.done.remove(&next) {
                    break (next, chunk);
                }
                if state.shutdown && state.outstanding == 0 {
                    return;
                }
                state = shared
                    .output_ready
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        let result = {
            let mut guard = dest.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.as_mut() {
                Some(writer) => writer.write_chunk(&chunk),
                None => return,
            }
        };
        match result {
            Ok(()) => {
                let mut state = shared.lock();
                state.next_emit += 1;
                state.outstanding -= 1;
                tracing::trace!(seq, "chunk emitted in order");
                shared.space_ready.notify_all();
                shared.emitted.notify_all();
                shared.output_ready.notify_all();
            }
            Err(e) => {
                shared.fail(e);
                return;
            }
        }
    }
}
