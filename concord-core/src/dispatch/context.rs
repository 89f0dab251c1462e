//! Dispatch contexts.

use std::collections::VecDeque;
use std::fmt;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::DispatchError;

/// A unit of work marshaled to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that jobs can be marshaled to.
///
/// Jobs posted from one thread to one context run in the order they were
/// posted.
pub trait DispatchContext: Send + Sync {
    /// Queue `job` and return immediately.
    fn post(&self, job: Job);

    /// Queue `job` and block until it has run.
    ///
    /// Runs `job` inline when called from the context itself.
    fn send(&self, job: Job) -> Result<(), DispatchError>;

    /// Whether the calling thread is this context's thread.
    fn is_current(&self) -> bool;
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl DispatchContext for InlineContext {
    fn post(&self, job: Job) {
        job();
    }

    fn send(&self, job: Job) -> Result<(), DispatchError> {
        job();
        Ok(())
    }

    fn is_current(&self) -> bool {
        true
    }
}

/// Wrap `job` so the returned receiver resolves once it has run.
pub(crate) fn completion_pair(job: Job) -> (Job, oneshot::Receiver<()>) {
    let (done_tx, done_rx) = oneshot::channel();
    let wrapped: Job = Box::new(move || {
        job();
        let _ = done_tx.send(());
    });
    (wrapped, done_rx)
}

/// A job queue owned by the thread that created it.
///
/// Nothing runs until the owner calls [`LoopContext::run_pending`]. A `send`
/// from another thread blocks until the owner drains the queue.
pub struct LoopContext {
    owner: ThreadId,
    queue: Mutex<VecDeque<Job>>,
}

impl LoopContext {
    /// Create a loop owned by the calling thread.
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Run queued jobs until the queue is empty, including jobs queued by the
    /// jobs themselves. Returns how many jobs ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Popped one at a time so jobs may post while we run.
            let next = self.queue.lock().pop_front();
            match next {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for LoopContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchContext for LoopContext {
    fn post(&self, job: Job) {
        self.queue.lock().push_back(job);
    }

    fn send(&self, job: Job) -> Result<(), DispatchError> {
        if self.is_current() {
            job();
            return Ok(());
        }

        let (job, done) = completion_pair(job);
        self.post(job);
        done.blocking_recv().map_err(|_| {
            warn!("loop context dropped a sent job before running it");
            DispatchError::Closed
        })
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }
}

impl fmt::Debug for LoopContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopContext")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .finish()
    }
}
