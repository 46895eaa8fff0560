//! Bounded Watermark Queue
//!
//! A FIFO that owns its storage and tells a single producer when to pause and
//! when to carry on. Occupancy reaching the upper watermark suspends the
//! producer; draining back down to the lower watermark resumes it. Sizes in
//! between never signal, so a queue hovering around one threshold does not
//! toggle the producer on every item.
//!
//! Offers never block and never reject; the queue signals rather than enforces
//! its bound. Polls block only while the queue is empty, and only up to the
//! supplied timeout.
//!
//! Both callbacks run with the queue lock held. They must be quick, must not
//! block, and must not call back into the same queue.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;
use crate::queue::blocking::{wait_for_item, BlockingQueue, PollOutcome, WaitResult, WaitState};
use crate::queue::config::WatermarkConfig;
use crate::queue::error::QueueResult;
use crate::queue::statistics::{WatermarkStatistics, WatermarkStats};
use crate::queue::watermarks::Watermarks;

/// Producer suspend/resume action
pub type Callback = Box<dyn Fn() + Send + Sync>;

struct QueueState<E> {
    items: VecDeque<E>,
    producer_suspended: bool,
    interrupts: u64,
}

impl<E> WaitState for QueueState<E> {
    fn has_item(&self) -> bool {
        !self.items.is_empty()
    }

    fn interrupt_epoch(&self) -> u64 {
        self.interrupts
    }
}

/// Thread-safe FIFO with hysteresis-based producer backpressure
pub struct BoundedWatermarkQueue<E> {
    state: Mutex<QueueState<E>>,
    not_empty: Condvar,
    watermarks: Watermarks,
    max_wait: Duration,
    on_suspend: Callback,
    on_resume: Callback,
    statistics: WatermarkStatistics,
}

impl<E> BoundedWatermarkQueue<E> {
    /// Create a queue that calls `on_suspend` when occupancy reaches the upper
    /// watermark and `on_resume` when it drains back to the lower one.
    pub fn new<S, R>(watermarks: Watermarks, max_wait: Duration, on_suspend: S, on_resume: R) -> Self
    where
        S: Fn() + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        log::info!(
            "Created watermark queue with watermarks {} and max wait {:?}",
            watermarks,
            max_wait
        );

        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(watermarks.lower() + watermarks.upper()),
                producer_suspended: false,
                interrupts: 0,
            }),
            not_empty: Condvar::new(),
            watermarks,
            max_wait,
            on_suspend: Box::new(on_suspend),
            on_resume: Box::new(on_resume),
            statistics: WatermarkStatistics::new(),
        }
    }

    /// Create a queue from validated configuration
    pub fn from_config<S, R>(config: &WatermarkConfig, on_suspend: S, on_resume: R) -> QueueResult<Self>
    where
        S: Fn() + Send + Sync + 'static,
        R: Fn() + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self::new(config.watermarks()?, config.max_wait(), on_suspend, on_resume))
    }

    /// Append an item at the tail. Always accepts and never blocks.
    pub fn offer(&self, item: E) -> bool {
        let mut state = self.state.lock();
        let size_was = state.items.len();

        state.items.push_back(item);
        self.statistics.record_in(1);
        if size_was == 0 {
            self.not_empty.notify_one();
        }

        if !state.producer_suspended && size_was == self.watermarks.upper() - 1 {
            state.producer_suspended = true;
            self.statistics.record_suspension();
            log::debug!(
                "Queue reached upper watermark {}, suspending producer",
                self.watermarks.upper()
            );
            (self.on_suspend)();
        }

        true
    }

    /// Remove the head item, waiting up to the configured maximum wait
    pub fn poll(&self) -> Option<E> {
        self.poll_timeout(self.max_wait)
    }

    /// Remove the head item, waiting up to `timeout` while the queue is empty
    pub fn poll_timeout(&self, timeout: Duration) -> Option<E> {
        self.poll_outcome(timeout).into_item()
    }

    /// Remove the head item, reporting why nothing was returned
    pub fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E> {
        let mut state = self.state.lock();
        match wait_for_item(&self.not_empty, &mut state, timeout) {
            WaitResult::Ready => {}
            WaitResult::TimedOut => return PollOutcome::TimedOut,
            WaitResult::Interrupted => {
                log::trace!("Watermark queue poll interrupted");
                return PollOutcome::Interrupted;
            }
        }

        let size_was = state.items.len();
        let Some(item) = state.items.pop_front() else {
            return PollOutcome::TimedOut;
        };
        self.statistics.record_out(1);

        if state.producer_suspended && size_was == self.watermarks.lower() + 1 {
            state.producer_suspended = false;
            self.statistics.record_resumption();
            log::debug!(
                "Queue drained to lower watermark {}, resuming producer",
                self.watermarks.lower()
            );
            (self.on_resume)();
        }

        // Pass the wake-up along while items remain
        if !state.items.is_empty() {
            self.not_empty.notify_one();
        }

        PollOutcome::Item(item)
    }

    /// Wake every consumer currently blocked in a poll. Each returns
    /// `PollOutcome::Interrupted` without consuming an item.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        self.not_empty.notify_all();
    }

    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Whether the producer is currently told to pause
    pub fn is_producer_suspended(&self) -> bool {
        self.state.lock().producer_suspended
    }

    pub fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn statistics(&self) -> WatermarkStats {
        self.statistics.snapshot()
    }
}

impl<E: Clone> BoundedWatermarkQueue<E> {
    /// Copy of the head item, if any. Suspension state is untouched.
    pub fn peek(&self) -> Option<E> {
        self.state.lock().items.front().cloned()
    }

    /// Copy of all queued items in FIFO order
    pub fn snapshot(&self) -> Vec<E> {
        self.state.lock().items.iter().cloned().collect()
    }
}

impl<E> BlockingQueue<E> for BoundedWatermarkQueue<E> {
    fn offer(&self, item: E) -> Result<(), E> {
        BoundedWatermarkQueue::offer(self, item);
        Ok(())
    }

    fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E> {
        BoundedWatermarkQueue::poll_outcome(self, timeout)
    }

    fn len(&self) -> usize {
        self.size()
    }
}

impl<E> std::fmt::Debug for BoundedWatermarkQueue<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedWatermarkQueue")
            .field("size", &state.items.len())
            .field("producer_suspended", &state.producer_suspended)
            .field("watermarks", &self.watermarks)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}
