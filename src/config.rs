//! Configuration for mgmt txrx descriptor pools
//!
//! Loaded from TOML:
//!
//! ```toml
//! [pool]
//! name = "mgmt_desc_pool"
//! capacity = 512
//!
//! [simulation]
//! workers = 4
//! frames_per_worker = 1000
//! completion_delay_us = 50
//! ```
//!
//! `MGMT_TXRX_POOL_CAPACITY` overrides `pool.capacity`.

use crate::error::{Error, Result};
use crate::MGMT_DESC_POOL_MAX;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Environment variable overriding the pool capacity
pub const CAPACITY_ENV: &str = "MGMT_TXRX_POOL_CAPACITY";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub simulation: SimulationConfig,
}

/// Descriptor pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub name: String,
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "mgmt_desc_pool".to_string(),
            capacity: MGMT_DESC_POOL_MAX,
        }
    }
}

/// Submit/complete simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Concurrent transmit tasks
    pub workers: usize,
    pub frames_per_worker: usize,
    /// Delay before a completion is delivered
    pub completion_delay_us: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            frames_per_worker: 1000,
            completion_delay_us: 50,
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config = Self::parse_toml(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating, so overrides can still apply
    fn parse_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load from a file, then apply environment overrides
    ///
    /// Validation runs once, after the overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {:?}", path);

        let mut config = Self::parse_toml(&text)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply environment overrides, then validate
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(CAPACITY_ENV) {
            self.pool.capacity = parse_capacity(&value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.capacity == 0 {
            return Err(Error::InvalidArgument(
                "pool.capacity must be greater than zero".to_string(),
            ));
        }
        if self.pool.name.is_empty() {
            return Err(Error::InvalidArgument("pool.name must not be empty".to_string()));
        }
        if self.simulation.workers == 0 {
            return Err(Error::InvalidArgument(
                "simulation.workers must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Render back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

fn parse_capacity(value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| {
        Error::Config(format!("{} must be a positive integer, got '{}'", CAPACITY_ENV, value))
    })
}
