//! Priority scheduling: higher tiers preempt at the head of the queue,
//! FIFO within a tier, and no preemption of the entry being attempted.

use std::sync::Arc;
use std::time::Duration;

use prefstore_core::{Operation, Priority, SettingsStore};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::backends::{ScriptedBackend, one_entry};

fn set_op(key: &str) -> Operation {
    Operation::set(one_entry(key, json!(true)))
}

#[tokio::test]
async fn critical_jumps_queue_but_not_the_in_flight_entry() {
    let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_millis(60)));
    let store = SettingsStore::with_defaults(backend.clone());

    let store_a = store.clone();
    let a = tokio::spawn(async move {
        store_a.queue_operation(set_op("a"), Priority::Normal).await
    });

    // Wait until the drain task has dispatched `a` to the backend, so
    // the entries below arrive while it is genuinely in flight.
    while backend.call_count() == 0 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let b = store.queue_operation(set_op("b"), Priority::Normal);
    let c = store.queue_operation(set_op("c"), Priority::Low);
    let d = store.queue_operation(set_op("d"), Priority::Critical);

    let (b, c, d) = tokio::join!(b, c, d);
    let a = a.await.unwrap();
    assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());

    // `a` runs to completion; Critical overtakes only the still-queued
    // entries.
    let observed: Vec<String> = backend.calls().iter().map(|c| c.keys[0].clone()).collect();
    assert_eq!(observed, vec!["a", "d", "b", "c"]);
}

#[tokio::test]
async fn equal_priorities_complete_in_arrival_order() {
    let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_millis(10)));
    let store = SettingsStore::with_defaults(backend.clone());

    let first = store.queue_operation(set_op("first"), Priority::High);
    let second = store.queue_operation(set_op("second"), Priority::High);
    let third = store.queue_operation(set_op("third"), Priority::High);

    let (r1, r2, r3) = tokio::join!(first, second, third);
    assert!(r1.is_ok() && r2.is_ok() && r3.is_ok());

    let observed: Vec<String> = backend.calls().iter().map(|c| c.keys[0].clone()).collect();
    assert_eq!(observed, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn queue_status_reports_length_and_high_water_mark() {
    let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_millis(30)));
    let store = SettingsStore::with_defaults(backend.clone());

    let a = store.queue_operation(set_op("a"), Priority::Normal);
    let b = store.queue_operation(set_op("b"), Priority::Normal);
    let c = store.queue_operation(set_op("c"), Priority::Normal);

    let (_, _, _, status) = tokio::join!(a, b, c, async {
        // Sample while the first entry is still being processed.
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.queue_status().await
    });

    assert!(status.is_processing);
    // `a` had been popped for processing; `b` and `c` were still queued.
    assert_eq!(status.queue_length, 2);
    assert_eq!(status.stats.total_enqueued, 3);
    assert!(status.stats.high_water_mark >= 2);
}
