//! Producer/Consumer Pipeline Tests
//!
//! Runs a real producer thread that pauses and resumes purely from the
//! watermark callbacks, against a consumer that drains more slowly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use watermarks::queue::{
    BoundedWatermarkQueue, SyncQueue, WatermarkPreset, WatermarkTracker, Watermarks,
};

const ITEMS: usize = 2_000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Flag toggled only by watermark callbacks, standing in for pausing a socket read
#[derive(Clone, Default)]
struct ProducerGate {
    paused: Arc<AtomicBool>,
    pauses: Arc<AtomicUsize>,
}

impl ProducerGate {
    fn suspend(&self) -> impl Fn() + Send + Sync + 'static {
        let gate = self.clone();
        move || {
            gate.paused.store(true, Ordering::SeqCst);
            gate.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn resume(&self) -> impl Fn() + Send + Sync + 'static {
        let paused = Arc::clone(&self.paused);
        move || paused.store(false, Ordering::SeqCst)
    }

    fn wait_until_open(&self) {
        while self.paused.load(Ordering::SeqCst) {
            thread::yield_now();
        }
    }
}

#[test]
fn test_bounded_queue_pipeline_respects_upper_watermark() {
    init_logging();

    let gate = ProducerGate::default();
    let watermarks = Watermarks::new(4, 16).unwrap();
    let queue = Arc::new(BoundedWatermarkQueue::new(
        watermarks,
        Duration::from_millis(50),
        gate.suspend(),
        gate.resume(),
    ));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let producer = {
        let queue = Arc::clone(&queue);
        let gate = gate.clone();
        let max_seen = Arc::clone(&max_seen);
        thread::spawn(move || {
            for i in 0..ITEMS {
                gate.wait_until_open();
                queue.offer(i);
                max_seen.fetch_max(queue.size(), Ordering::SeqCst);
            }
        })
    };

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut received = Vec::with_capacity(ITEMS);
            while received.len() < ITEMS {
                if let Some(item) = queue.poll_timeout(Duration::from_secs(10)) {
                    received.push(item);
                    if received.len() % 64 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            }
            received
        })
    };

    producer.join().unwrap();
    let received = consumer.join().unwrap();

    assert_eq!(received, (0..ITEMS).collect::<Vec<_>>());
    assert!(max_seen.load(Ordering::SeqCst) <= watermarks.upper());
    assert!(queue.is_empty());
    assert!(!queue.is_producer_suspended());

    let stats = queue.statistics();
    assert_eq!(stats.items_in, ITEMS as u64);
    assert_eq!(stats.items_out, ITEMS as u64);
    assert_eq!(stats.suspensions, stats.resumptions);
    assert_eq!(stats.suspensions as usize, gate.pauses.load(Ordering::SeqCst));
}

#[test]
fn test_mono_tracker_pipeline() {
    init_logging();

    let gate = ProducerGate::default();
    let config = WatermarkPreset::LowLatency.config();
    let backing = Arc::new(SyncQueue::unbounded());
    let tracker = Arc::new(WatermarkTracker::new_mono(
        Arc::clone(&backing),
        config.watermarks().unwrap(),
        gate.resume(),
        gate.suspend(),
    ));

    let producer = {
        let tracker = Arc::clone(&tracker);
        let gate = gate.clone();
        thread::spawn(move || {
            for i in 0..ITEMS {
                gate.wait_until_open();
                tracker.add(i).unwrap();
            }
        })
    };

    let consumer = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || {
            let mut received = Vec::with_capacity(ITEMS);
            while received.len() < ITEMS {
                received.extend(tracker.poll_batch(1, Duration::from_secs(10)));
            }
            received
        })
    };

    producer.join().unwrap();
    let received = consumer.join().unwrap();

    assert_eq!(received, (0..ITEMS).collect::<Vec<_>>());
    assert_eq!(tracker.outstanding(&()), 0);
    assert!(!tracker.is_producer_suspended());

    let stats = tracker.statistics();
    assert_eq!(stats.suspensions, stats.resumptions);
    assert_eq!(stats.in_flight(), 0);
}

#[test]
fn test_idle_consumer_times_out_without_items() {
    init_logging();

    let queue: BoundedWatermarkQueue<u32> =
        BoundedWatermarkQueue::from_config(&WatermarkPreset::LowLatency.config(), || {}, || {})
            .unwrap();

    for _ in 0..5 {
        assert_eq!(queue.poll(), None);
    }
    assert_eq!(queue.statistics().items_out, 0);
}
