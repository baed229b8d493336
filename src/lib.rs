// mgmt-txrx - Management frame TX/RX descriptor pool
// Correlation handles for in-flight 802.11 management frames

#![warn(rust_2018_idioms)]

pub mod config;
pub mod context;
pub mod desc_pool;
pub mod metrics;
pub mod sim;

// Re-exports for convenience
pub use config::{Config, PoolConfig, SimulationConfig};
pub use context::{MgmtTxRxContext, PsocId};
pub use desc_pool::{DescId, DescPool, PoolStats};

/// Default descriptor pool size for a management txrx context
pub const MGMT_DESC_POOL_MAX: usize = 512;

/// mgmt-txrx error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Out of memory: {0}")]
        OutOfMemory(String),

        #[error("Descriptor pool '{pool}' exhausted ({capacity} descriptors in flight)")]
        Exhausted { pool: String, capacity: usize },

        #[error("Invalid descriptor handle {id}: {reason}")]
        InvalidHandle { id: u32, reason: String },

        #[error("Invalid state: {0}")]
        InvalidState(String),

        #[error("Lock recursion: {0}")]
        LockRecursion(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    impl Error {
        /// Exhaustion is backpressure, not a failure of the pool
        pub fn is_exhausted(&self) -> bool {
            matches!(self, Error::Exhausted { .. })
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::Error;
    use super::*;

    #[test]
    fn test_version_format() {
        let _version: &str = VERSION;
    }

    #[test]
    fn test_exhausted_is_recoverable() {
        let err = Error::Exhausted {
            pool: "mgmt".to_string(),
            capacity: 4,
        };
        assert!(err.is_exhausted());
        assert!(!Error::InvalidState("x".to_string()).is_exhausted());
        assert!(err.to_string().contains("'mgmt' exhausted"));
    }
}
