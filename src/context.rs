//! Per-device mgmt txrx context
//!
//! Each physical device (psoc) owns exactly one context, which in turn owns
//! the descriptor pool used by that device's management frame paths.
//! Callers hold the context explicitly; there is no global instance.

use crate::config::PoolConfig;
use crate::desc_pool::{DescId, DescPool, PoolStats};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Identifier of the physical device owning a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PsocId(pub u8);

impl fmt::Display for PsocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "psoc{}", self.0)
    }
}

/// Management txrx state for one device
#[derive(Debug)]
pub struct MgmtTxRxContext<T = ()> {
    psoc: PsocId,
    pool: DescPool<T>,
}

impl<T> MgmtTxRxContext<T> {
    /// Create the context and its descriptor pool
    pub fn create(psoc: PsocId, config: &PoolConfig) -> Result<Self> {
        let pool = DescPool::with_capacity(format!("{}_{}", config.name, psoc), config.capacity)?;
        info!(%psoc, capacity = config.capacity, "Created mgmt txrx context");
        Ok(Self { psoc, pool })
    }

    /// Tear down the descriptor pool
    pub fn destroy(self) -> Result<()> {
        self.pool.deinit()?;
        info!(psoc = %self.psoc, "Destroyed mgmt txrx context");
        Ok(())
    }

    pub fn psoc(&self) -> PsocId {
        self.psoc
    }

    pub fn pool(&self) -> &DescPool<T> {
        &self.pool
    }

    /// Reserve a descriptor for a frame about to be submitted
    pub fn track_frame(&self, frame: T) -> Result<DescId> {
        self.pool.acquire_with(frame)
    }

    /// Complete a frame, returning what was tracked for it
    pub fn complete_frame(&self, id: DescId) -> Result<Option<T>> {
        self.pool.release(id)
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}
