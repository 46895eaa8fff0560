//! Watermark-based backpressure for bounded, concurrently accessed queues.
//!
//! See [`queue`] for the bounded watermark queue and the multi-source tracker.

pub mod logging;
pub mod queue;

pub use queue::{
    BlockingQueue, BoundedWatermarkQueue, PollOutcome, QueueError, QueueResult, WatermarkConfig,
    WatermarkTracker, Watermarks,
};
