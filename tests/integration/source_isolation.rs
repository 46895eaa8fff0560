//! Source Isolation Tests
//!
//! Several producers, each a distinct logical source, share one backing queue.
//! Each producer pauses only on callbacks carrying its own key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use watermarks::queue::{SyncQueue, WatermarkTracker, Watermarks};

const SOURCES: usize = 4;
const ITEMS_PER_SOURCE: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Suspend,
    Resume,
}

#[test]
fn test_sources_receive_only_their_own_signals() {
    let gates: Arc<Vec<AtomicBool>> =
        Arc::new((0..SOURCES).map(|_| AtomicBool::new(false)).collect());
    let signals: Arc<Mutex<Vec<(usize, Signal)>>> = Arc::new(Mutex::new(Vec::new()));

    let tracker = {
        let (resume_gates, suspend_gates) = (Arc::clone(&gates), Arc::clone(&gates));
        let (resume_log, suspend_log) = (Arc::clone(&signals), Arc::clone(&signals));
        Arc::new(WatermarkTracker::new_multi(
            Arc::new(SyncQueue::unbounded()),
            Watermarks::new(8, 32).unwrap(),
            |item: &(usize, usize)| item.0,
            move |source: &usize| {
                resume_gates[*source].store(false, Ordering::SeqCst);
                resume_log.lock().unwrap().push((*source, Signal::Resume));
            },
            move |source: &usize| {
                suspend_gates[*source].store(true, Ordering::SeqCst);
                suspend_log.lock().unwrap().push((*source, Signal::Suspend));
            },
        ))
    };

    let producers: Vec<_> = (0..SOURCES)
        .map(|source| {
            let tracker = Arc::clone(&tracker);
            let gates = Arc::clone(&gates);
            thread::spawn(move || {
                for seq in 0..ITEMS_PER_SOURCE {
                    while gates[source].load(Ordering::SeqCst) {
                        thread::yield_now();
                    }
                    tracker.add((source, seq)).unwrap();
                    // Never more than the upper watermark plus the add in flight
                    assert!(tracker.outstanding(&source) <= 32 + 1);
                }
            })
        })
        .collect();

    let consumer = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || {
            let mut received: HashMap<usize, Vec<usize>> = HashMap::new();
            let mut total = 0;
            while total < SOURCES * ITEMS_PER_SOURCE {
                if let Some((source, seq)) = tracker.poll(Duration::from_secs(10)) {
                    received.entry(source).or_default().push(seq);
                    total += 1;
                }
            }
            received
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    let received = consumer.join().unwrap();

    let signals = signals.lock().unwrap().clone();
    for source in 0..SOURCES {
        // Per-source FIFO survives multiplexing
        assert_eq!(received[&source], (0..ITEMS_PER_SOURCE).collect::<Vec<_>>());
        assert_eq!(tracker.outstanding(&source), 0);
        assert!(!tracker.is_suspended(&source));

        let own: Vec<Signal> = signals
            .iter()
            .filter(|(key, _)| *key == source)
            .map(|(_, signal)| *signal)
            .collect();
        for pair in own.chunks(2) {
            assert_eq!(pair, [Signal::Suspend, Signal::Resume]);
        }
    }
    assert_eq!(tracker.source_count(), SOURCES);
}

#[test]
fn test_suspended_source_does_not_block_others() {
    let tracker = WatermarkTracker::new_multi(
        Arc::new(SyncQueue::unbounded()),
        Watermarks::new(0, 2).unwrap(),
        |item: &&str| item.split(':').next().unwrap_or_default().to_string(),
        |_: &String| {},
        |_: &String| {},
    );

    tracker.add("slow:1").unwrap();
    tracker.add("slow:2").unwrap();
    tracker.add("fast:1").unwrap();

    let slow = "slow".to_string();
    let fast = "fast".to_string();
    assert!(tracker.is_suspended(&slow));
    assert!(!tracker.is_suspended(&fast));

    // Repeated queries do not change the answer
    for _ in 0..10 {
        assert!(tracker.is_suspended(&slow));
        assert!(!tracker.is_suspended(&fast));
    }
}
