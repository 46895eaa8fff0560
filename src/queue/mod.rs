//! Watermark Backpressure Queues
//!
//! This module tells producers when to pause and when to resume based on how
//! full a queue is, using two thresholds (hysteresis) so that a queue hovering
//! near one level does not flip the producer on and off with every item.
//!
//! # Architecture
//!
//! - **BoundedWatermarkQueue**: owns its FIFO storage and signals one producer
//! - **WatermarkTracker**: wraps an external `BlockingQueue` and tracks any
//!   number of logical sources independently, each with its own lock
//! - **BlockingQueue**: the backing-queue contract, with `SyncQueue` and
//!   `ChannelQueue` implementations
//! - **WatermarkConfig**: serde/TOML configuration and presets
//!
//! # Usage
//!
//! ```rust
//! use watermarks::queue::{BoundedWatermarkQueue, Watermarks};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let paused = Arc::new(AtomicBool::new(false));
//! let (on_suspend, on_resume) = (Arc::clone(&paused), Arc::clone(&paused));
//!
//! let queue = BoundedWatermarkQueue::new(
//!     Watermarks::new(1, 3).unwrap(),
//!     Duration::from_millis(10),
//!     move || on_suspend.store(true, Ordering::SeqCst),
//!     move || on_resume.store(false, Ordering::SeqCst),
//! );
//!
//! for i in 0..3 {
//!     queue.offer(i);
//! }
//! assert!(paused.load(Ordering::SeqCst));
//!
//! queue.poll();
//! queue.poll();
//! assert!(!paused.load(Ordering::SeqCst));
//! ```

pub mod blocking;
pub mod config;
pub mod error;
pub mod statistics;
pub mod watermark_queue;
pub mod watermark_tracker;
pub mod watermarks;

// Re-export main types for convenience
pub use blocking::{BlockingQueue, ChannelQueue, PollOutcome, SyncQueue};
pub use config::{load_watermark_config, save_watermark_config, WatermarkConfig, WatermarkPreset};
pub use error::{QueueError, QueueResult};
pub use statistics::{WatermarkStatistics, WatermarkStats};
pub use watermark_queue::BoundedWatermarkQueue;
pub use watermark_tracker::{SourceSnapshot, WatermarkTracker};
pub use watermarks::Watermarks;
