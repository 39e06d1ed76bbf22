//! Facade usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache usage through one facade.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// `get` calls that returned a payload.
    pub hits: u64,
    /// `get` calls that returned nothing.
    pub misses: u64,
    /// Successful `set` calls.
    pub writes: u64,
    /// Entries removed through `remove` and `flush_by_tag`.
    pub removals: u64,
    /// Whether the namespace was frozen when the stats were taken.
    pub frozen: bool,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    removals: AtomicU64,
}

impl StatsRecorder {
    pub fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removals(&self, count: u64) {
        self.removals.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, frozen: bool) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            frozen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recorder_snapshot() {
        let recorder = StatsRecorder::default();
        recorder.record_lookup(true);
        recorder.record_lookup(false);
        recorder.record_lookup(false);
        recorder.record_write();
        recorder.record_removals(4);

        let stats = recorder.snapshot(true);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.removals, 4);
        assert!(stats.frozen);
    }
}
