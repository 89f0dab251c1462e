//! Error Types
//!
//! All fallible operations in this crate report a [`CollectionError`]. The
//! variants mirror the ways a call can be rejected: a bad argument, an index
//! outside the current bounds, a mutation on a read-only container, a
//! duplicate dictionary key, an empty container, or a disposed entity.
//!
//! Validation always happens before any notification is raised, so a call
//! that returns an error has not changed the container and has not produced
//! an event.

use thiserror::Error;

use crate::lifecycle::DisposedError;

/// Result alias used throughout the crate.
pub type Result<T, E = CollectionError> = std::result::Result<T, E>;

/// Errors raised by container, property and dispatch operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// An argument was invalid for reasons other than its bounds.
    #[error("invalid argument `{name}`: {reason}")]
    Argument {
        name: &'static str,
        reason: String,
    },

    /// A single index was outside the current bounds.
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A range `index..index + count` was outside the current bounds.
    #[error("range starting at {index} with {count} item(s) is out of range for length {len}")]
    RangeOutOfRange {
        index: usize,
        count: usize,
        len: usize,
    },

    /// A mutation was attempted on a read-only container.
    #[error("`{operation}` is not supported on read-only {type_name}")]
    NotSupported {
        operation: &'static str,
        type_name: &'static str,
    },

    /// A dictionary already holds the key being added.
    #[error("an item with the key {key} has already been added")]
    DuplicateKey { key: String },

    /// A removal or peek was attempted on an empty container.
    #[error("{type_name} is empty")]
    EmptyContainer { type_name: &'static str },

    /// The entity has been disposed.
    #[error(transparent)]
    Disposed(#[from] DisposedError),
}

impl CollectionError {
    pub(crate) fn argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Argument {
            name,
            reason: reason.into(),
        }
    }

    /// Check a single index against `len` (inclusive of `len` when inserting).
    pub(crate) fn check_index(index: usize, len: usize, inclusive: bool) -> Result<()> {
        let ok = if inclusive { index <= len } else { index < len };
        if ok {
            Ok(())
        } else {
            Err(Self::IndexOutOfRange { index, len })
        }
    }

    pub(crate) fn check_range(index: usize, count: usize, len: usize) -> Result<()> {
        match index.checked_add(count) {
            Some(end) if end <= len => Ok(()),
            _ => Err(Self::RangeOutOfRange { index, count, len }),
        }
    }
}

/// Errors raised by the dispatch substrate.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher thread could not be started.
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The target dispatcher has shut down and will not run the job.
    #[error("dispatcher has shut down")]
    Closed,

    /// The background worker used by an async send failed.
    #[error("background send failed: {reason}")]
    Join { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_checks() {
        assert!(CollectionError::check_index(0, 0, true).is_ok());
        assert_eq!(
            CollectionError::check_index(0, 0, false),
            Err(CollectionError::IndexOutOfRange { index: 0, len: 0 })
        );
        assert!(CollectionError::check_index(2, 3, false).is_ok());
    }

    #[test]
    fn range_checks_do_not_overflow() {
        assert!(CollectionError::check_range(1, 2, 3).is_ok());
        assert!(CollectionError::check_range(3, 0, 3).is_ok());
        assert!(matches!(
            CollectionError::check_range(usize::MAX, 2, 3),
            Err(CollectionError::RangeOutOfRange { .. })
        ));
    }

    #[test]
    fn messages_name_the_operation() {
        let err = CollectionError::NotSupported {
            operation: "insert",
            type_name: "FilteredView",
        };
        assert_eq!(
            err.to_string(),
            "`insert` is not supported on read-only FilteredView"
        );
    }
}
