#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Lion Pool
//!
//! Bounded pooling of expensive, reusable resources for the Lion microkernel.
//!
//! A [`Pool`] caches idle resources (connections, clients, handles) so that
//! their creation cost is paid once and amortized over many checkouts. The
//! pool is agnostic to what it stores: a collaborator supplies a `create`
//! callback and, optionally, `validate` and `dispose` callbacks.
//!
//! ```no_run
//! use lion_pool::Pool;
//!
//! let pool = Pool::new(2, 10, || Ok::<_, std::io::Error>(Vec::<u8>::with_capacity(4096)))?;
//! let buf = pool.get()?;
//! pool.put(buf);
//! pool.destroy();
//! # Ok::<(), lion_pool::PoolError>(())
//! ```
//!
//! ## Guarantees
//!
//! - No operation ever blocks waiting for another caller.
//! - The number of idle resources never exceeds the configured capacity.
//! - Once destroyed, every idle resource is disposed exactly once and the
//!   pool accepts nothing new.

/// Capacity settings for a pool
pub mod config;

/// Error types returned by pool operations
pub mod error;

/// The pool itself and its builder
pub mod pool;

/// TCP connections as pooled resources
pub mod tcp;

pub use config::PoolConfig;
pub use error::{BoxError, PoolError, Result};
pub use pool::{Pool, PoolBuilder, PoolState, PoolStats, Pooled};
