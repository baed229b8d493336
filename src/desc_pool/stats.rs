//! Descriptor pool statistics

use serde::{Deserialize, Serialize};

/// Running counters kept under the pool lock
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PoolCounters {
    pub acquires: u64,
    pub releases: u64,
    pub exhaustions: u64,
    pub high_watermark: usize,
}

impl PoolCounters {
    pub fn on_acquire(&mut self, leased: usize) {
        self.acquires += 1;
        self.high_watermark = self.high_watermark.max(leased);
    }

    pub fn on_release(&mut self) {
        self.releases += 1;
    }

    pub fn on_exhausted(&mut self) {
        self.exhaustions += 1;
    }
}

/// Point-in-time view of a descriptor pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub ready: bool,
    pub capacity: usize,
    pub free: usize,
    pub leased: usize,
    /// Most descriptors ever leased at once since `init`
    pub high_watermark: usize,
    pub acquires: u64,
    pub releases: u64,
    pub exhaustions: u64,
}

impl PoolStats {
    /// Fraction of the pool currently leased (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.leased as f64 / self.capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_high_watermark() {
        let mut c = PoolCounters::default();
        c.on_acquire(1);
        c.on_acquire(2);
        c.on_release();
        c.on_acquire(2);
        c.on_exhausted();

        assert_eq!(c.acquires, 3);
        assert_eq!(c.releases, 1);
        assert_eq!(c.exhaustions, 1);
        assert_eq!(c.high_watermark, 2);
    }

    #[test]
    fn test_utilization() {
        let stats = PoolStats {
            capacity: 8,
            leased: 2,
            free: 6,
            ..Default::default()
        };
        assert!((stats.utilization() - 0.25).abs() < f64::EPSILON);
        assert_eq!(PoolStats::default().utilization(), 0.0);
    }
}
