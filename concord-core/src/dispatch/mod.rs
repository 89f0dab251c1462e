//! Dispatch Substrate
//!
//! Notifications that must reach a particular thread (typically a UI thread)
//! ride on a [`SyncOperation`]. A sync operation resolves to a
//! [`DispatchContext`] and exposes two primitives:
//!
//! - `post`: queue a job on the target context and return immediately.
//! - `send`: queue a job and block until it has run. Calling `send` from the
//!   target context itself runs the job inline instead of deadlocking.
//!
//! `send_async` is the variant for callers already inside an async task: the
//! blocking wait is moved onto a tokio blocking worker.
//!
//! # Contexts
//!
//! - [`InlineContext`] runs every job on the calling thread.
//! - [`ThreadDispatcher`] owns a dedicated worker thread fed by a FIFO queue.
//! - [`LoopContext`] is a queue owned by the thread that created it and
//!   drained explicitly, the shape of a UI message loop.
//!
//! # Delegation
//!
//! A sync operation either owns a context or delegates to another sync
//! operation through a weak reference. Delegation is resolved at call time by
//! walking the chain iteratively, so retargeting the root of a hierarchy
//! retargets every object that adopted it. Cycles are rejected when the
//! delegation is set up and guarded against again during resolution.

mod context;
mod sync_operation;
mod thread;

pub use context::{DispatchContext, InlineContext, Job, LoopContext};
pub use sync_operation::{HasSyncOperation, SyncOperation};
pub use thread::{ThreadDispatcher, ThreadDispatcherBuilder};
