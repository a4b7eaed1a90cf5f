//! Errors surfaced by [`Pool`](crate::Pool) construction and checkout.
//!
//! `put` and `destroy` never fail, so every variant here is reported by
//! either the constructor or `get`.

use thiserror::Error;

/// Boxed error produced by a resource `create` callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Error returned by pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Capacity settings are unusable (zero capacity or more initial
    /// resources than the pool may hold)
    #[error("invalid pool capacity: initial size {initial_size}, max size {max_size}")]
    InvalidCapacity {
        /// Requested number of eagerly created resources
        initial_size: usize,
        /// Requested maximum number of idle resources
        max_size: usize,
    },

    /// The pool has been destroyed
    #[error("pool is closed")]
    PoolClosed,

    /// The `create` callback failed
    #[error("failed to create resource: {0}")]
    CreateFailed(#[source] BoxError),

    /// No `create` callback was configured
    #[error("no create function configured, cannot create resource")]
    NoFactory,
}

impl PoolError {
    /// Whether this error means the pool can never hand out a resource again.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::PoolClosed)
    }
}
