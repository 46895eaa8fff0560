//! Watermark Thresholds
//!
//! A validated lower/upper threshold pair shared by the bounded queue and the
//! per-source tracker. Construction is the only place the ordering contract is
//! checked, so every queue built from a `Watermarks` value is well formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::queue::error::{QueueError, QueueResult};

/// Lower and upper occupancy thresholds, `lower < upper`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWatermarks")]
pub struct Watermarks {
    lower: usize,
    upper: usize,
}

#[derive(Deserialize)]
struct RawWatermarks {
    lower: usize,
    upper: usize,
}

impl TryFrom<RawWatermarks> for Watermarks {
    type Error = QueueError;

    fn try_from(raw: RawWatermarks) -> QueueResult<Self> {
        Self::new(raw.lower, raw.upper)
    }
}

impl Watermarks {
    /// Create a threshold pair, rejecting `lower >= upper`
    pub fn new(lower: usize, upper: usize) -> QueueResult<Self> {
        if lower >= upper {
            return Err(QueueError::invalid_watermarks(lower, upper));
        }
        Ok(Self { lower, upper })
    }

    /// Occupancy at which a suspended producer is resumed
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// Occupancy at which the producer is suspended
    pub fn upper(&self) -> usize {
        self.upper
    }

    /// Lower watermark as a signed count, for comparison with source counters
    pub(crate) fn lower_count(&self) -> i64 {
        i64::try_from(self.lower).unwrap_or(i64::MAX)
    }

    /// Upper watermark as a signed count, for comparison with source counters
    pub(crate) fn upper_count(&self) -> i64 {
        i64::try_from(self.upper).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for Watermarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
