//! Multi-Source Watermark Tracker
//!
//! Applies watermark backpressure to a queue the tracker does not own. Items
//! are classified into logical sources (connections, partitions, ...), and each
//! source has its own outstanding-item counter and suspended flag, guarded by
//! its own lock. Sources never contend with each other. The only shared
//! structure is the source map, which takes a write lock only when a key is
//! seen for the first time.
//!
//! Per source, in `incoming(n)` the counter is raised and the upper callback
//! fires once it is at or above the upper watermark (a level test, so batched
//! increments cannot skip past it). In `outgoing(n)` the counter is lowered and
//! the lower callback fires only when it lands exactly on the lower watermark.
//! A decrement that jumps over the lower watermark leaves the source suspended
//! until a later decrement lands on it. Polls, batched or not, release items
//! one at a time.
//!
//! Callbacks run with the source lock held. They must be quick and must not
//! call back into the tracker for the same source.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use crate::queue::blocking::{BlockingQueue, PollOutcome};
use crate::queue::statistics::{WatermarkStatistics, WatermarkStats};
use crate::queue::watermarks::Watermarks;

/// Suspend/resume action receiving the source key
pub type KeyedCallback<S> = Box<dyn Fn(&S) + Send + Sync>;

/// Maps a payload to its logical source
pub type Classifier<E, S> = Box<dyn Fn(&E) -> S + Send + Sync>;

/// Thresholds and actions shared by every source of one tracker
pub(crate) struct Hysteresis<S> {
    watermarks: Watermarks,
    on_lower: KeyedCallback<S>,
    on_upper: KeyedCallback<S>,
    statistics: WatermarkStatistics,
}

#[derive(Debug, Default)]
struct SourceState {
    counter: i64,
    suspended: bool,
}

/// Outstanding-item counter and suspended flag for one source
pub(crate) struct SourceTracker<S> {
    key: S,
    state: Mutex<SourceState>,
}

impl<S> SourceTracker<S> {
    fn new(key: S) -> Self {
        Self {
            key,
            state: Mutex::new(SourceState::default()),
        }
    }

    pub(crate) fn incoming(&self, n: i64, hysteresis: &Hysteresis<S>) {
        let mut state = self.state.lock();
        state.counter += n;
        hysteresis.statistics.record_in(n.unsigned_abs());

        if state.counter >= hysteresis.watermarks.upper_count() && !state.suspended {
            state.suspended = true;
            hysteresis.statistics.record_suspension();
            log::debug!(
                "Source reached upper watermark with {} outstanding, suspending",
                state.counter
            );
            (hysteresis.on_upper)(&self.key);
        }
    }

    pub(crate) fn outgoing(&self, n: i64, hysteresis: &Hysteresis<S>) {
        let mut state = self.state.lock();
        state.counter -= n;
        hysteresis.statistics.record_out(n.unsigned_abs());

        if state.counter == hysteresis.watermarks.lower_count() && state.suspended {
            state.suspended = false;
            hysteresis.statistics.record_resumption();
            log::debug!(
                "Source drained to lower watermark with {} outstanding, resuming",
                state.counter
            );
            (hysteresis.on_lower)(&self.key);
        }
    }

    pub(crate) fn counter(&self) -> i64 {
        self.state.lock().counter
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    pub(crate) fn key(&self) -> &S {
        &self.key
    }
}

/// Lazily populated source trackers
enum SourceRegistry<E, S> {
    /// One implicit source; no classification needed
    Single(Arc<SourceTracker<S>>),
    /// Sources keyed by classifier output, created on first use
    Keyed {
        classifier: Classifier<E, S>,
        trackers: DashMap<S, Arc<SourceTracker<S>>>,
    },
}

impl<E, S> SourceRegistry<E, S>
where
    S: Eq + Hash + Clone,
{
    /// Key of the payload's source. Does not create a tracker.
    fn classify(&self, item: &E) -> S {
        match self {
            SourceRegistry::Single(tracker) => tracker.key().clone(),
            SourceRegistry::Keyed { classifier, .. } => classifier(item),
        }
    }

    fn for_payload(&self, item: &E) -> Arc<SourceTracker<S>> {
        self.for_source(self.classify(item))
    }

    fn for_source(&self, key: S) -> Arc<SourceTracker<S>> {
        match self {
            SourceRegistry::Single(tracker) => Arc::clone(tracker),
            SourceRegistry::Keyed { trackers, .. } => {
                if let Some(tracker) = trackers.get(&key) {
                    return Arc::clone(tracker.value());
                }
                let tracker = trackers
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(SourceTracker::new(key)));
                Arc::clone(tracker.value())
            }
        }
    }

    fn existing(&self, key: &S) -> Option<Arc<SourceTracker<S>>> {
        match self {
            SourceRegistry::Single(tracker) => Some(Arc::clone(tracker)),
            SourceRegistry::Keyed { trackers, .. } => {
                trackers.get(key).map(|tracker| Arc::clone(tracker.value()))
            }
        }
    }

    fn all(&self) -> Vec<Arc<SourceTracker<S>>> {
        match self {
            SourceRegistry::Single(tracker) => vec![Arc::clone(tracker)],
            SourceRegistry::Keyed { trackers, .. } => trackers
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect(),
        }
    }

    fn len(&self) -> usize {
        match self {
            SourceRegistry::Single(_) => 1,
            SourceRegistry::Keyed { trackers, .. } => trackers.len(),
        }
    }
}

/// Per-source counts of accepted items in a batch, applied in one step
struct SourceTally<S> {
    entries: Vec<(Arc<SourceTracker<S>>, i64)>,
}

impl<S> SourceTally<S> {
    fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn count(&mut self, tracker: Arc<SourceTracker<S>>) {
        // Payloads from one source tend to arrive in runs
        if let Some((last, n)) = self.entries.last_mut() {
            if Arc::ptr_eq(last, &tracker) {
                *n += 1;
                return;
            }
        }
        if let Some((_, n)) = self.entries.iter_mut().find(|(seen, _)| Arc::ptr_eq(seen, &tracker)) {
            *n += 1;
            return;
        }
        self.entries.push((tracker, 1));
    }
}

/// Observed state of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot<S> {
    pub key: S,
    pub outstanding: i64,
    pub suspended: bool,
}

/// Watermark backpressure over an externally owned queue, tracked per source
pub struct WatermarkTracker<E, S, Q: ?Sized> {
    queue: Arc<Q>,
    hysteresis: Hysteresis<S>,
    sources: SourceRegistry<E, S>,
}

fn ignore_key<S, F>(action: F) -> KeyedCallback<S>
where
    S: 'static,
    F: Fn() + Send + Sync + 'static,
{
    Box::new(move |_: &S| action())
}

impl<E, Q> WatermarkTracker<E, (), Q>
where
    Q: BlockingQueue<E> + ?Sized,
{
    /// Track every payload as one implicit source
    pub fn new_mono<L, U>(queue: Arc<Q>, watermarks: Watermarks, on_lower: L, on_upper: U) -> Self
    where
        L: Fn() + Send + Sync + 'static,
        U: Fn() + Send + Sync + 'static,
    {
        log::info!("Created mono watermark tracker with watermarks {}", watermarks);

        Self {
            queue,
            hysteresis: Hysteresis {
                watermarks,
                on_lower: ignore_key(on_lower),
                on_upper: ignore_key(on_upper),
                statistics: WatermarkStatistics::new(),
            },
            sources: SourceRegistry::Single(Arc::new(SourceTracker::new(()))),
        }
    }

    /// Whether the single producer is currently told to pause
    pub fn is_producer_suspended(&self) -> bool {
        self.is_suspended(&())
    }
}

impl<E, S, Q> WatermarkTracker<E, S, Q>
where
    S: Eq + Hash + Clone,
    Q: BlockingQueue<E> + ?Sized,
{
    /// Track payloads per source key produced by `classifier`
    pub fn new_multi<C, L, U>(
        queue: Arc<Q>,
        watermarks: Watermarks,
        classifier: C,
        on_lower: L,
        on_upper: U,
    ) -> Self
    where
        C: Fn(&E) -> S + Send + Sync + 'static,
        L: Fn(&S) + Send + Sync + 'static,
        U: Fn(&S) + Send + Sync + 'static,
    {
        log::info!("Created multi-source watermark tracker with watermarks {}", watermarks);

        Self {
            queue,
            hysteresis: Hysteresis {
                watermarks,
                on_lower: Box::new(on_lower),
                on_upper: Box::new(on_upper),
                statistics: WatermarkStatistics::new(),
            },
            sources: SourceRegistry::Keyed {
                classifier: Box::new(classifier),
                trackers: DashMap::new(),
            },
        }
    }

    /// Offer an item to the backing queue and count it against its source.
    ///
    /// A backing queue that refuses the item hands it back as `Err`; the
    /// source counter is left unchanged.
    pub fn add(&self, item: E) -> Result<(), E> {
        let key = self.sources.classify(&item);
        if let Err(item) = <Q as BlockingQueue<E>>::offer(&self.queue, item) {
            log::warn!("Backing queue rejected item, source counter unchanged");
            return Err(item);
        }
        self.sources.for_source(key).incoming(1, &self.hysteresis);
        Ok(())
    }

    /// Offer every item, then charge each source once for its accepted items.
    /// Returns the items the backing queue refused, in order.
    pub fn add_batch<I>(&self, items: I) -> Vec<E>
    where
        I: IntoIterator<Item = E>,
    {
        let mut tally = SourceTally::new();
        let mut rejected = Vec::new();

        for item in items {
            let key = self.sources.classify(&item);
            match <Q as BlockingQueue<E>>::offer(&self.queue, item) {
                Ok(()) => tally.count(self.sources.for_source(key)),
                Err(item) => rejected.push(item),
            }
        }

        if !rejected.is_empty() {
            log::warn!("Backing queue rejected {} items of batch", rejected.len());
        }
        for (tracker, n) in tally.entries {
            tracker.incoming(n, &self.hysteresis);
        }
        rejected
    }

    /// Take the next item, waiting up to `timeout`, and release it from its source
    pub fn poll(&self, timeout: Duration) -> Option<E> {
        self.poll_outcome(timeout).into_item()
    }

    /// Take the next item, reporting why nothing was returned
    pub fn poll_outcome(&self, timeout: Duration) -> PollOutcome<E> {
        let outcome = <Q as BlockingQueue<E>>::poll_outcome(&self.queue, timeout);
        if let PollOutcome::Item(item) = &outcome {
            self.sources.for_payload(item).outgoing(1, &self.hysteresis);
        }
        outcome
    }

    /// Wait up to `timeout` for a first item, then drain up to `max` items in
    /// total without waiting further.
    ///
    /// Items are released from their sources one at a time, in drain order,
    /// so a source passing through its lower watermark mid-batch resumes.
    pub fn poll_batch(&self, max: usize, timeout: Duration) -> Vec<E> {
        let mut items = Vec::new();
        if max == 0 {
            return items;
        }

        let mut wait = timeout;
        while items.len() < max {
            match <Q as BlockingQueue<E>>::poll_outcome(&self.queue, wait) {
                PollOutcome::Item(item) => {
                    self.sources.for_payload(&item).outgoing(1, &self.hysteresis);
                    items.push(item);
                }
                PollOutcome::TimedOut | PollOutcome::Interrupted => break,
            }
            wait = Duration::ZERO;
        }
        items
    }

    /// Whether the source is currently told to pause. Unknown sources are not.
    pub fn is_suspended(&self, key: &S) -> bool {
        self.sources
            .existing(key)
            .is_some_and(|tracker| tracker.is_suspended())
    }

    /// Items counted against the source and not yet polled
    pub fn outstanding(&self, key: &S) -> i64 {
        self.sources
            .existing(key)
            .map_or(0, |tracker| tracker.counter())
    }

    /// Number of sources seen so far
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Point-in-time state of every known source
    pub fn sources(&self) -> Vec<SourceSnapshot<S>> {
        self.sources
            .all()
            .into_iter()
            .map(|tracker| SourceSnapshot {
                key: tracker.key().clone(),
                outstanding: tracker.counter(),
                suspended: tracker.is_suspended(),
            })
            .collect()
    }

    pub fn watermarks(&self) -> Watermarks {
        self.hysteresis.watermarks
    }

    pub fn statistics(&self) -> WatermarkStats {
        self.hysteresis.statistics.snapshot()
    }

    /// The backing queue
    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    #[cfg(test)]
    pub(crate) fn tracker_for_source(&self, key: S) -> Arc<SourceTracker<S>> {
        self.sources.for_source(key)
    }

    #[cfg(test)]
    pub(crate) fn tracker_for_payload(&self, item: &E) -> Arc<SourceTracker<S>> {
        self.sources.for_payload(item)
    }

    #[cfg(test)]
    pub(crate) fn hysteresis(&self) -> &Hysteresis<S> {
        &self.hysteresis
    }
}
