//! Watermark Statistics
//!
//! Lock-free counters for items flowing through a watermark queue and for the
//! suspend/resume crossings it has signalled. Counters are updated from inside
//! the critical sections that detect a crossing, so a snapshot never shows a
//! resume that was not preceded by its suspend on the same source.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the watermark counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkStats {
    /// Items accepted by the queue
    pub items_in: u64,

    /// Items handed to consumers
    pub items_out: u64,

    /// Upper watermark crossings (producer suspended)
    pub suspensions: u64,

    /// Lower watermark crossings (producer resumed)
    pub resumptions: u64,
}

impl WatermarkStats {
    /// Items accepted but not yet consumed
    pub fn in_flight(&self) -> u64 {
        self.items_in.saturating_sub(self.items_out)
    }

    /// Get a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "Watermarks: {} in, {} out, {} suspensions, {} resumptions",
            self.items_in, self.items_out, self.suspensions, self.resumptions
        )
    }
}

/// Shared counters behind `WatermarkStats`
#[derive(Debug, Default)]
pub struct WatermarkStatistics {
    items_in: AtomicU64,
    items_out: AtomicU64,
    suspensions: AtomicU64,
    resumptions: AtomicU64,
}

impl WatermarkStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_in(&self, n: u64) {
        self.items_in.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_out(&self, n: u64) {
        self.items_out.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resumption(&self) {
        self.resumptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WatermarkStats {
        WatermarkStats {
            items_in: self.items_in.load(Ordering::Relaxed),
            items_out: self.items_out.load(Ordering::Relaxed),
            suspensions: self.suspensions.load(Ordering::Relaxed),
            resumptions: self.resumptions.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.items_in.store(0, Ordering::Relaxed);
        self.items_out.store(0, Ordering::Relaxed);
        self.suspensions.store(0, Ordering::Relaxed);
        self.resumptions.store(0, Ordering::Relaxed);
        log::debug!("Watermark statistics reset");
    }
}
