//! Admission control: the queue rejects rather than grow without bound.

use std::sync::Arc;
use std::time::Duration;

use prefstore_core::{Operation, Priority, SettingsStore, StoreConfig, StoreError};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::backends::{ScriptedBackend, one_entry};

#[tokio::test]
async fn third_enqueue_rejects_when_capacity_is_two() {
    let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_millis(20)));
    let config = StoreConfig {
        max_queue_size: 2,
        ..StoreConfig::default()
    };
    let store = SettingsStore::new(backend.clone(), config);

    // All three enqueues land before the drain task gets to run, so the
    // first two fill the queue and the third is refused.
    let a = store.queue_operation(Operation::set(one_entry("a", json!(1))), Priority::Normal);
    let b = store.queue_operation(Operation::set(one_entry("b", json!(2))), Priority::Normal);
    let c = store.queue_operation(Operation::set(one_entry("c", json!(3))), Priority::Normal);

    let (a, b, c) = tokio::join!(a, b, c);
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(c.unwrap_err(), StoreError::QueueFull { capacity: 2 });

    // The rejected operation never reached the backend.
    assert_eq!(backend.call_count(), 2);

    let status = store.queue_status().await;
    assert_eq!(status.stats.rejected_full, 1);
    assert_eq!(status.stats.total_enqueued, 2);
}

#[tokio::test]
async fn rejected_enqueue_settles_without_waiting_for_the_queue() {
    let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_secs(5)));
    let config = StoreConfig {
        max_queue_size: 1,
        ..StoreConfig::default()
    };
    let store = SettingsStore::new(backend, config);

    let slow = store.queue_operation(Operation::get_all(), Priority::Normal);
    let rejected = store.queue_operation(Operation::get_all(), Priority::Normal);

    // The rejection must settle promptly even though the queued
    // operation will grind for seconds.
    let err = tokio::time::timeout(Duration::from_millis(500), async {
        let (_slow, rejected) = tokio::join!(
            async {
                // Keep the slow future alive without awaiting completion.
                tokio::select! {
                    res = slow => Some(res),
                    _ = tokio::time::sleep(Duration::from_millis(400)) => None,
                }
            },
            rejected
        );
        rejected
    })
    .await
    .expect("rejection must not block");

    assert_eq!(err.unwrap_err(), StoreError::QueueFull { capacity: 1 });
}

#[tokio::test]
async fn clear_queue_rejects_all_pending_and_empties() {
    let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_millis(100)));
    let store = SettingsStore::with_defaults(backend.clone());

    let store_a = store.clone();
    let store_b = store.clone();
    let store_c = store.clone();
    let a = tokio::spawn(async move {
        store_a
            .queue_operation(Operation::set(one_entry("a", json!(1))), Priority::Normal)
            .await
    });
    let b = tokio::spawn(async move {
        store_b
            .queue_operation(Operation::set(one_entry("b", json!(2))), Priority::Normal)
            .await
    });
    let c = tokio::spawn(async move {
        store_c
            .queue_operation(Operation::set(one_entry("c", json!(3))), Priority::Normal)
            .await
    });

    // Let the tasks enqueue and the drain task start on the head entry.
    tokio::time::sleep(Duration::from_millis(30)).await;
    store.clear_queue(true).await;

    let results = [
        a.await.unwrap(),
        b.await.unwrap(),
        c.await.unwrap(),
    ];
    let cleared = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::QueueCleared)))
        .count();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();

    // The in-flight head entry completes; the queued rest are rejected.
    assert_eq!(succeeded, 1);
    assert_eq!(cleared, 2);

    let status = store.queue_status().await;
    assert_eq!(status.queue_length, 0);
}
