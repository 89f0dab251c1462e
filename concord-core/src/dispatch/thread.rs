//! Dedicated dispatcher thread.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, warn};

use super::context::{completion_pair, DispatchContext, Job};
use crate::error::DispatchError;

/// Configuration for a [`ThreadDispatcher`].
#[derive(Debug, Clone, Default)]
pub struct ThreadDispatcherBuilder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl ThreadDispatcherBuilder {
    /// Name of the worker thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stack size of the worker thread, in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Start the worker thread.
    pub fn spawn(self) -> Result<Arc<ThreadDispatcher>, DispatchError> {
        let name = self.name.unwrap_or_else(|| "concord-dispatch".to_string());
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let worker_name = name.clone();
        let handle = builder.spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(dispatcher = %worker_name, "dispatched job panicked");
                }
            }
            debug!(dispatcher = %worker_name, "dispatcher stopped");
        })?;

        Ok(Arc::new(ThreadDispatcher {
            name,
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        }))
    }
}

/// A dispatch context backed by one dedicated worker thread.
///
/// Jobs run in FIFO order. The thread stops when the dispatcher is shut down
/// or dropped; jobs already queued still run.
pub struct ThreadDispatcher {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<UnboundedSender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadDispatcher {
    /// Configure a dispatcher before spawning it.
    pub fn builder() -> ThreadDispatcherBuilder {
        ThreadDispatcherBuilder::default()
    }

    /// Spawn a dispatcher with default settings.
    pub fn spawn() -> Result<Arc<Self>, DispatchError> {
        Self::builder().spawn()
    }

    /// Name of the worker thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting jobs and wait for queued jobs to finish.
    ///
    /// When called from the worker thread itself the queue is closed but not
    /// joined.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if self.is_current() {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!(dispatcher = %self.name, "dispatcher thread panicked");
            }
        }
    }

    /// Whether the worker still accepts jobs.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    fn enqueue(&self, job: Job) -> Result<(), DispatchError> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(job).map_err(|_| DispatchError::Closed),
            None => Err(DispatchError::Closed),
        }
    }
}

impl DispatchContext for ThreadDispatcher {
    fn post(&self, job: Job) {
        if self.enqueue(job).is_err() {
            warn!(dispatcher = %self.name, "post to a stopped dispatcher was dropped");
        }
    }

    fn send(&self, job: Job) -> Result<(), DispatchError> {
        if self.is_current() {
            job();
            return Ok(());
        }

        let (job, done) = completion_pair(job);
        self.enqueue(job)?;
        done.blocking_recv().map_err(|_| DispatchError::Closed)
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDispatcher")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
