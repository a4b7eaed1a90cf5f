//! Pool capacity configuration.

use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a resource pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of resources created eagerly when the pool is built
    pub initial_size: usize,

    /// Maximum number of idle resources kept for reuse
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 2,
            max_size: 10,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given sizes
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            initial_size,
            max_size,
        }
    }

    /// Check that the capacity settings are usable.
    ///
    /// Fails with [`PoolError::InvalidCapacity`] when `max_size` is zero or
    /// `initial_size` exceeds it.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 || self.initial_size > self.max_size {
            return Err(PoolError::InvalidCapacity {
                initial_size: self.initial_size,
                max_size: self.max_size,
            });
        }
        Ok(())
    }
}
