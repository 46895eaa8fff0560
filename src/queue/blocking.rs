//! Blocking Queue Abstraction
//!
//! The watermark tracker does not own storage. It drives any queue that offers
//! a non-blocking `offer` and a timed, blocking `poll`. This module defines that
//! contract and ships two implementations:
//!
//! - [`SyncQueue`]: mutex + condition variable FIFO, bounded or unbounded,
//!   whose blocked consumers can be interrupted.
//! - [`ChannelQueue`]: a crossbeam channel used as a queue.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a timed poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<E> {
    /// An item was removed from the head of the queue
    Item(E),
    /// The queue stayed empty for the whole wait
    TimedOut,
    /// The wait was cut short by an interrupt; nothing was consumed
    Interrupted,
}

impl<E> PollOutcome<E> {
    /// Collapse timeout and interruption into "no item"
    pub fn into_item(self) -> Option<E> {
        match self {
            PollOutcome::Item(item) => Some(item),
            PollOutcome::TimedOut | PollOutcome::Interrupted => None,
        }
    }

    pub fn is_item(&self) -> bool {
        matches!(self, PollOutcome::Item(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, PollOutcome::TimedOut)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, PollOutcome::Interrupted)
    }

    pub fn as_item(&self) -> Option<&E> {
        match self {
            PollOutcome::Item(item) => Some(item),
            _ => None,
        }
    }
}

/// Concurrent FIFO with non-blocking offer and timed blocking poll
pub trait BlockingQueue<E> {
    /// Append an item without blocking. A full queue hands the item back.
    fn offer(&self, item: E) -> Result<(), E>;

    /// Remove the head item, waiting up to `timeout` for one to arrive
    fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E>;

    /// Current number of queued items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poll_timeout(&self, timeout: Duration) -> Option<E> {
        self.poll_outcome(timeout).into_item()
    }
}

impl<E, Q> BlockingQueue<E> for Arc<Q>
where
    Q: BlockingQueue<E> + ?Sized,
{
    fn offer(&self, item: E) -> Result<(), E> {
        <Q as BlockingQueue<E>>::offer(&**self, item)
    }

    fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E> {
        <Q as BlockingQueue<E>>::poll_outcome(&**self, timeout)
    }

    fn len(&self) -> usize {
        <Q as BlockingQueue<E>>::len(&**self)
    }
}

/// Lock-protected state a consumer can wait on
pub(crate) trait WaitState {
    fn has_item(&self) -> bool;
    fn interrupt_epoch(&self) -> u64;
}

/// Reason a consumer stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitResult {
    Ready,
    TimedOut,
    Interrupted,
}

/// Block on `condvar` until the state holds an item, `timeout` expires, or an
/// interrupt is raised after the wait began. Spurious wake-ups and items
/// stolen by other consumers are absorbed by re-waiting until the deadline.
pub(crate) fn wait_for_item<T: WaitState>(
    condvar: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    timeout: Duration,
) -> WaitResult {
    let entry_epoch = guard.interrupt_epoch();
    let deadline = Instant::now().checked_add(timeout);

    loop {
        if guard.has_item() {
            return WaitResult::Ready;
        }
        if guard.interrupt_epoch() != entry_epoch {
            return WaitResult::Interrupted;
        }

        match deadline {
            Some(deadline) => {
                if condvar.wait_until(guard, deadline).timed_out() {
                    if guard.has_item() {
                        return WaitResult::Ready;
                    }
                    if guard.interrupt_epoch() != entry_epoch {
                        return WaitResult::Interrupted;
                    }
                    return WaitResult::TimedOut;
                }
            }
            // Deadline beyond the representable range: wait without one
            None => condvar.wait(guard),
        }
    }
}

struct SyncState<E> {
    items: VecDeque<E>,
    interrupts: u64,
}

impl<E> WaitState for SyncState<E> {
    fn has_item(&self) -> bool {
        !self.items.is_empty()
    }

    fn interrupt_epoch(&self) -> u64 {
        self.interrupts
    }
}

/// Mutex + condition variable FIFO, bounded or unbounded
pub struct SyncQueue<E> {
    state: Mutex<SyncState<E>>,
    not_empty: Condvar,
    capacity: Option<usize>,
}

impl<E> SyncQueue<E> {
    /// Create a queue that rejects offers once `capacity` items are queued
    pub fn bounded(capacity: usize) -> Self {
        Self::with_limit(Some(capacity))
    }

    /// Create a queue that accepts every offer
    pub fn unbounded() -> Self {
        Self::with_limit(None)
    }

    fn with_limit(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(SyncState {
                items: VecDeque::with_capacity(capacity.unwrap_or(0)),
                interrupts: 0,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Maximum number of queued items, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Wake every consumer currently blocked in a poll; each returns
    /// `PollOutcome::Interrupted`. Later polls are unaffected.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        self.not_empty.notify_all();
    }
}

impl<E> Default for SyncQueue<E> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<E> BlockingQueue<E> for SyncQueue<E> {
    fn offer(&self, item: E) -> Result<(), E> {
        let mut state = self.state.lock();
        if let Some(capacity) = self.capacity {
            if state.items.len() >= capacity {
                log::trace!("SyncQueue full at {} items, rejecting offer", capacity);
                return Err(item);
            }
        }

        let was_empty = state.items.is_empty();
        state.items.push_back(item);
        if was_empty {
            self.not_empty.notify_one();
        }
        Ok(())
    }

    fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E> {
        let mut state = self.state.lock();
        match wait_for_item(&self.not_empty, &mut state, timeout) {
            WaitResult::Ready => {}
            WaitResult::TimedOut => return PollOutcome::TimedOut,
            WaitResult::Interrupted => return PollOutcome::Interrupted,
        }

        match state.items.pop_front() {
            Some(item) => {
                if !state.items.is_empty() {
                    self.not_empty.notify_one();
                }
                PollOutcome::Item(item)
            }
            None => PollOutcome::TimedOut,
        }
    }

    fn len(&self) -> usize {
        self.state.lock().items.len()
    }
}

/// Crossbeam channel used as a blocking queue
///
/// Both ends are held by the queue, so the channel never disconnects while the
/// queue is alive. Blocked polls cannot be interrupted; they end on timeout.
pub struct ChannelQueue<E> {
    sender: Sender<E>,
    receiver: Receiver<E>,
}

impl<E> ChannelQueue<E> {
    /// Create a channel queue holding at most `capacity` items.
    ///
    /// A capacity of zero yields a rendezvous channel: offers succeed only
    /// while a consumer is blocked in `poll`.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self { sender, receiver }
    }

    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.sender.capacity()
    }
}

impl<E> BlockingQueue<E> for ChannelQueue<E> {
    fn offer(&self, item: E) -> Result<(), E> {
        self.sender.try_send(item).map_err(|e| e.into_inner())
    }

    fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => PollOutcome::Item(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                PollOutcome::TimedOut
            }
        }
    }

    fn len(&self) -> usize {
        self.receiver.len()
    }
}
