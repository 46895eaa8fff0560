//! Queue Error Types
//!
//! Defines error types for watermark queue construction and configuration.
//! Transient conditions (an empty queue, a timed-out or interrupted wait) are
//! never errors; they surface as an empty poll result.

use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors that can occur while building or configuring a watermark queue
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Lower watermark is not strictly below the upper watermark
    #[error("Invalid watermarks: lower ({lower}) must be less than upper ({upper})")]
    InvalidWatermarks { lower: usize, upper: usize },

    /// Configuration value outside its permitted range
    #[error("Invalid queue configuration: {message}")]
    InvalidConfig { message: String },
}

impl QueueError {
    /// Create an invalid watermarks error
    pub fn invalid_watermarks(lower: usize, upper: usize) -> Self {
        Self::InvalidWatermarks { lower, upper }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
