//! Pipeline Statistics
//!
//! Lock-free counters updated as packets cross the table pipeline.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub packets: AtomicU64,
    pub range_misses: AtomicU64,
    pub classify_misses: AtomicU64,
    pub attacks: AtomicU64,
}

impl PipelineStats {
    #[inline(always)]
    pub fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_range_miss(&self) {
        self.range_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_classify_miss(&self) {
        self.classify_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_attack(&self) {
        self.attacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            range_misses: self.range_misses.load(Ordering::Relaxed),
            classify_misses: self.classify_misses.load(Ordering::Relaxed),
            attacks: self.attacks.load(Ordering::Relaxed),
        }
    }
}

/// Stats snapshot (non-atomic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub packets: u64,
    pub range_misses: u64,
    pub classify_misses: u64,
    pub attacks: u64,
}

impl PipelineStatsSnapshot {
    /// Fraction of classified packets marked Attack
    pub fn attack_ratio(&self) -> f64 {
        if self.packets == 0 {
            0.0
        } else {
            self.attacks as f64 / self.packets as f64
        }
    }
}
