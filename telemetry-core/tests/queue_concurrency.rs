use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use telemetry_core::clock::Clock;
use telemetry_core::event::{EventRecord, TrackerEvent};
use telemetry_core::filter::{AllowAll, EventRegistry};
use telemetry_core::tracking::EventQueue;

const PRODUCERS: usize = 4;
const PER_PRODUCER: usize = 500;

struct Numbered {
    producer: usize,
    n: usize,
}

impl TrackerEvent for Numbered {
    fn event_type(&self) -> &str {
        "Numbered"
    }

    fn fields(&self) -> Map<String, Value> {
        Map::from_iter([
            ("producer".to_string(), json!(self.producer)),
            ("n".to_string(), json!(self.n)),
        ])
    }
}

fn key(record: &EventRecord) -> (usize, usize) {
    let field = |name: &str| record.fields()[name].as_u64().unwrap() as usize;
    (field("producer"), field("n"))
}

#[test]
fn concurrent_submits_land_in_exactly_one_batch_in_order() {
    let queue = Arc::new(EventQueue::new(Arc::new(AllowAll), Clock::new(), "threads"));
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = queue.clone();
            thread::spawn(move || {
                for n in 0..PER_PRODUCER {
                    assert!(queue.submit(&Numbered { producer, n }));
                }
            })
        })
        .collect();

    // 生产者运行期间持续 drain，模拟刷新循环
    let drainer = {
        let queue = queue.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut batches = Vec::new();
            while !done.load(Ordering::Acquire) {
                let batch = queue.drain();
                if !batch.is_empty() {
                    batches.push(batch);
                }
                thread::yield_now();
            }
            batches
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let mut batches = drainer.join().unwrap();
    batches.push(queue.drain());

    let all: Vec<(usize, usize)> = batches.iter().flatten().map(key).collect();
    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);

    // 同一生产者的事件保持提交顺序，且每个事件只出现一次
    let mut next: HashMap<usize, usize> = HashMap::new();
    for (producer, n) in all {
        let expected = next.entry(producer).or_default();
        assert_eq!(n, *expected, "producer {producer} out of order");
        *expected += 1;
    }
    assert!(next.values().all(|&count| count == PER_PRODUCER));
    assert!(queue.is_empty());
}

#[test]
fn disabled_events_never_reach_a_batch_under_contention() {
    let queue = Arc::new(EventQueue::new(
        Arc::new(EventRegistry::enabling(["Enabled"])),
        Clock::new(),
        "threads",
    ));

    struct Named(&'static str);
    impl TrackerEvent for Named {
        fn event_type(&self) -> &str {
            self.0
        }
    }

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut accepted = 0;
                for i in 0..PER_PRODUCER {
                    let name = if i % 2 == 0 { "Enabled" } else { "Disabled" };
                    if queue.submit(&Named(name)) {
                        accepted += 1;
                    }
                }
                accepted
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let drained = queue.drain();

    assert_eq!(accepted, PRODUCERS * PER_PRODUCER / 2);
    assert_eq!(drained.len(), accepted);
    assert!(drained.iter().all(|r| r.event_type() == "Enabled"));
}
