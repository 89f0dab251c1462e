//! The sync operation: a shareable, retargetable dispatch capability.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::warn;

use super::context::{DispatchContext, InlineContext};
use crate::error::{CollectionError, DispatchError, Result};

/// Upper bound on delegation hops walked during resolution.
const MAX_DELEGATION_DEPTH: usize = 64;

enum DispatchTarget {
    /// Jobs go straight to this context.
    Own(Arc<dyn DispatchContext>),

    /// Jobs follow another sync operation. `fallback` is the context this
    /// operation resolved to when the delegation was set up, used if the
    /// delegate has been dropped.
    DelegatesTo {
        target: Weak<SyncInner>,
        fallback: Arc<dyn DispatchContext>,
    },
}

struct SyncInner {
    target: RwLock<DispatchTarget>,
}

/// A handle to a dispatch target.
///
/// Cloning shares the handle: retargeting one clone retargets all of them.
#[derive(Clone)]
pub struct SyncOperation {
    inner: Arc<SyncInner>,
}

/// Objects that expose a [`SyncOperation`].
pub trait HasSyncOperation {
    fn sync_operation(&self) -> &SyncOperation;
}

impl HasSyncOperation for SyncOperation {
    fn sync_operation(&self) -> &SyncOperation {
        self
    }
}

impl SyncOperation {
    /// Create an operation that dispatches to `context`.
    pub fn new(context: Arc<dyn DispatchContext>) -> Self {
        Self::from_target(DispatchTarget::Own(context))
    }

    /// Create an operation that runs every job on the calling thread.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineContext))
    }

    /// Create an operation that follows `other`.
    pub fn delegating_to(other: &SyncOperation) -> Self {
        Self::from_target(DispatchTarget::DelegatesTo {
            target: Arc::downgrade(&other.inner),
            fallback: other.resolve(),
        })
    }

    fn from_target(target: DispatchTarget) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                target: RwLock::new(target),
            }),
        }
    }

    /// Point this operation at an explicit context.
    pub fn set_context(&self, context: Arc<dyn DispatchContext>) {
        *self.inner.target.write() = DispatchTarget::Own(context);
    }

    /// Make this operation follow `other`, resolved lazily on every call.
    ///
    /// Fails with [`CollectionError::Argument`] if `other` already (directly
    /// or transitively) follows this operation.
    pub fn delegate_to(&self, other: &SyncOperation) -> Result<()> {
        if Arc::ptr_eq(&self.inner, &other.inner) || other.chain_contains(&self.inner) {
            return Err(CollectionError::argument(
                "other",
                "delegation would form a cycle",
            ));
        }

        let fallback = self.resolve();
        *self.inner.target.write() = DispatchTarget::DelegatesTo {
            target: Arc::downgrade(&other.inner),
            fallback,
        };
        Ok(())
    }

    /// Follow whatever sync operation `source` exposes.
    pub fn adopt<S>(&self, source: &S) -> Result<()>
    where
        S: HasSyncOperation + ?Sized,
    {
        self.delegate_to(source.sync_operation())
    }

    /// Whether this operation currently follows another one.
    pub fn is_delegating(&self) -> bool {
        matches!(
            *self.inner.target.read(),
            DispatchTarget::DelegatesTo { .. }
        )
    }

    /// Resolve the context jobs are currently sent to.
    pub fn resolve(&self) -> Arc<dyn DispatchContext> {
        let mut current = Arc::clone(&self.inner);
        let mut visited: SmallVec<[*const SyncInner; 8]> = SmallVec::new();

        loop {
            visited.push(Arc::as_ptr(&current));

            let (next, fallback) = match &*current.target.read() {
                DispatchTarget::Own(context) => return Arc::clone(context),
                DispatchTarget::DelegatesTo { target, fallback } => {
                    match target.upgrade() {
                        Some(next) => (next, Arc::clone(fallback)),
                        None => {
                            warn!("sync operation delegate was dropped; using fallback context");
                            return Arc::clone(fallback);
                        }
                    }
                }
            };

            if visited.len() >= MAX_DELEGATION_DEPTH || visited.contains(&Arc::as_ptr(&next)) {
                warn!(hops = visited.len(), "sync operation delegation cycle; using fallback context");
                return fallback;
            }
            current = next;
        }
    }

    fn chain_contains(&self, needle: &Arc<SyncInner>) -> bool {
        let mut current = Arc::clone(&self.inner);
        for _ in 0..MAX_DELEGATION_DEPTH {
            let next = match &*current.target.read() {
                DispatchTarget::Own(_) => return false,
                DispatchTarget::DelegatesTo { target, .. } => match target.upgrade() {
                    Some(next) => next,
                    None => return false,
                },
            };
            if Arc::ptr_eq(&next, needle) {
                return true;
            }
            current = next;
        }
        true
    }

    /// Queue `job` on the target context and return immediately.
    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.resolve().post(Box::new(job));
    }

    /// Run `job` on the target context, blocking until it completes.
    pub fn send<F>(&self, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.resolve().send(Box::new(job))
    }

    /// [`send`](Self::send) for callers inside an async task.
    ///
    /// The blocking wait runs on a tokio blocking worker so the calling task's
    /// executor thread is never parked. Requires a tokio runtime.
    pub async fn send_async<F>(&self, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let context = self.resolve();
        if context.is_current() {
            job();
            return Ok(());
        }

        tokio::task::spawn_blocking(move || context.send(Box::new(job)))
            .await
            .map_err(|e| DispatchError::Join {
                reason: e.to_string(),
            })?
    }

    /// Whether the calling thread is the target context's thread.
    pub fn is_current(&self) -> bool {
        self.resolve().is_current()
    }

    /// Whether both operations currently resolve to the same context.
    pub fn shares_target_with(&self, other: &SyncOperation) -> bool {
        Arc::ptr_eq(&self.resolve(), &other.resolve())
    }
}

/// Threads carry no ambient dispatch context, so the default target is the
/// calling thread itself.
impl Default for SyncOperation {
    fn default() -> Self {
        Self::inline()
    }
}

impl fmt::Debug for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOperation")
            .field("delegating", &self.is_delegating())
            .finish()
    }
}
