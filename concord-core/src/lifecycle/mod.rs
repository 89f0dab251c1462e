//! Lifecycle
//!
//! Every observable entity in this crate owns a [`Lifecycle`]: a one-way
//! state machine `NotStarted -> Disposing -> Disposed` with a single-fire
//! "about to dispose" hook.
//!
//! # Disposal
//!
//! Disposal is idempotent and safe to race. The first caller to move the
//! state from `NotStarted` to `Disposing` (a compare-and-swap) runs the
//! disposing handlers and the entity's teardown, then publishes `Disposed`.
//! Every other caller sees the transition already taken and returns without
//! side effects.
//!
//! The state queries are single atomic loads and may be called from any
//! thread at any time, including from inside teardown.

mod disposable;

pub use disposable::{Disposable, DisposeState, DisposedError, Lifecycle};
