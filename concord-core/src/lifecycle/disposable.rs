//! Disposal state machine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Where an entity is in its disposal lifecycle.
///
/// Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DisposeState {
    /// The entity is live.
    NotStarted = 0,

    /// Teardown is running.
    Disposing = 1,

    /// Teardown has finished.
    Disposed = 2,
}

impl DisposeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Disposing,
            _ => Self::Disposed,
        }
    }
}

impl fmt::Display for DisposeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "live",
            Self::Disposing => "being disposed",
            Self::Disposed => "disposed",
        })
    }
}

/// Raised when an operation is attempted past the disposal threshold it
/// guards against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot access {type_name}: it is {state}")]
pub struct DisposedError {
    /// Name of the concrete type that was accessed.
    pub type_name: &'static str,
    /// The state observed when the guard failed.
    pub state: DisposeState,
}

type DisposingHandler = Box<dyn FnOnce() + Send>;

/// Tri-state disposal tracker with a single-fire pre-disposal hook.
pub struct Lifecycle {
    /// Name reported in [`DisposedError`] and logs.
    type_name: &'static str,

    /// A [`DisposeState`] stored as its discriminant.
    state: AtomicU8,

    /// Handlers fired once, right before teardown.
    on_disposing: Mutex<Vec<DisposingHandler>>,
}

impl Lifecycle {
    /// Create a live lifecycle for an entity of the given type name.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            state: AtomicU8::new(DisposeState::NotStarted as u8),
            on_disposing: Mutex::new(Vec::new()),
        }
    }

    /// The type name this lifecycle reports.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Current state.
    pub fn state(&self) -> DisposeState {
        DisposeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether teardown is in progress.
    pub fn is_disposing(&self) -> bool {
        self.state() == DisposeState::Disposing
    }

    /// Whether teardown has finished.
    pub fn is_disposed(&self) -> bool {
        self.state() == DisposeState::Disposed
    }

    /// Whether disposal has started.
    pub fn is_disposed_or_disposing(&self) -> bool {
        self.state() != DisposeState::NotStarted
    }

    /// Register a handler to run once, right before teardown.
    ///
    /// Returns `false` (and drops the handler) if disposal has already
    /// started.
    pub fn on_disposing<F>(&self, handler: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        // Checked under the handler lock: a disposer that wins the swap after
        // this check still drains the list after we release it.
        let mut handlers = self.on_disposing.lock();
        if self.is_disposed_or_disposing() {
            return false;
        }
        handlers.push(Box::new(handler));
        true
    }

    /// Dispose, running `teardown` if this call wins the transition.
    ///
    /// Returns `true` for the single winning caller and `false` for every
    /// other call, concurrent or later.
    pub fn dispose_with<F>(&self, teardown: F) -> bool
    where
        F: FnOnce(),
    {
        let won = self
            .state
            .compare_exchange(
                DisposeState::NotStarted as u8,
                DisposeState::Disposing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if !won {
            return false;
        }

        debug!(type_name = self.type_name, "disposing");

        let handlers = std::mem::take(&mut *self.on_disposing.lock());
        for handler in handlers {
            handler();
        }

        teardown();

        self.state
            .store(DisposeState::Disposed as u8, Ordering::Release);
        debug!(type_name = self.type_name, "disposed");
        true
    }

    /// Fail once teardown has finished.
    pub fn verify_not_disposed(&self) -> Result<(), DisposedError> {
        self.verify_below(DisposeState::Disposed)
    }

    /// Fail once teardown has started.
    pub fn verify_not_disposing(&self) -> Result<(), DisposedError> {
        self.verify_below(DisposeState::Disposing)
    }

    fn verify_below(&self, threshold: DisposeState) -> Result<(), DisposedError> {
        let state = self.state();
        if state < threshold {
            Ok(())
        } else {
            Err(DisposedError {
                type_name: self.type_name,
                state,
            })
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("type_name", &self.type_name)
            .field("state", &self.state())
            .finish()
    }
}

/// Entities that own a [`Lifecycle`].
pub trait Disposable {
    /// The entity's lifecycle.
    fn lifecycle(&self) -> &Lifecycle;

    /// Dispose the entity. Idempotent.
    fn dispose(&self);

    fn is_disposed(&self) -> bool {
        self.lifecycle().is_disposed()
    }

    fn is_disposing(&self) -> bool {
        self.lifecycle().is_disposing()
    }

    fn is_disposed_or_disposing(&self) -> bool {
        self.lifecycle().is_disposed_or_disposing()
    }
}
