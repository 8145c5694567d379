//! Concurrent writers never lose records

use futures::future::join_all;
use relay_core::{ChangeCoalescer, InMemoryQueue, ManualClock, RelayConfig};
use relay_record::{ChangeRecord, MutationEvent, PendingBatch, TrackedField};
use relay_store::MemoryStore;
use relay_test_utils::{identity, name_change, t0};
use std::collections::BTreeSet;
use std::sync::Arc;

fn dispatched_and_pending(queue: &InMemoryQueue, pending: &PendingBatch) -> BTreeSet<String> {
    queue
        .jobs()
        .iter()
        .flat_map(|scheduled| scheduled.job.records.iter())
        .chain(pending.iter())
        .map(|record| record.identity().to_string())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_with_urgent_flushes_lose_nothing() {
    let queue = Arc::new(InMemoryQueue::new("subscribers").with_background_depth(2));
    let config = RelayConfig {
        max_cas_attempts: 10_000,
        ..RelayConfig::new().with_urgency_threshold(10)
    };
    let coalescer = Arc::new(
        ChangeCoalescer::new(&config, Arc::new(MemoryStore::new()), queue.clone())
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(t0()))),
    );

    let handles: Vec<_> = (0..200)
        .map(|i| {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .on_mutation(&name_change(&identity(i), "Concurrent"))
                    .await
                    .unwrap()
            })
        })
        .collect();
    for result in join_all(handles).await {
        result.unwrap();
    }

    let pending = coalescer.store().load_pending().await.unwrap();
    let dispatched: usize = queue.jobs().iter().map(|s| s.job.len()).sum();

    // Single process: the flush gate means each record goes out exactly once
    assert_eq!(dispatched + pending.len(), 200);
    assert!(pending.len() < 10);

    let seen = dispatched_and_pending(&queue, &pending);
    assert_eq!(seen.len(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_processes_sharing_a_store_lose_nothing() {
    let kv = Arc::new(MemoryStore::new());
    let queue = Arc::new(InMemoryQueue::new("subscribers").with_background_depth(1));
    let config = RelayConfig {
        max_cas_attempts: 10_000,
        ..RelayConfig::new().with_urgency_threshold(5)
    };

    let nodes: Vec<Arc<ChangeCoalescer>> = (0..2)
        .map(|_| {
            Arc::new(
                ChangeCoalescer::new(&config, kv.clone(), queue.clone())
                    .unwrap()
                    .with_clock(Arc::new(ManualClock::new(t0()))),
            )
        })
        .collect();

    // Five users change over and over. Odd mutations carry a unique name;
    // even ones touch only untracked fields, so their records are identical
    let handles: Vec<_> = (0..200)
        .map(|i| {
            let node = nodes[i % 2].clone();
            let user = identity(i % 5);
            let event = if i % 2 == 0 {
                MutationEvent::new(user).with_change("phone", "555-0100")
            } else {
                name_change(&user, &format!("Shared {i}"))
            };
            tokio::spawn(async move { node.on_mutation(&event).await.unwrap() })
        })
        .collect();
    for result in join_all(handles).await {
        result.unwrap();
    }

    let pending = nodes[0].store().load_pending().await.unwrap();
    let jobs = queue.jobs();
    let all_records: Vec<&ChangeRecord> = jobs
        .iter()
        .flat_map(|scheduled| scheduled.job.records.iter())
        .chain(pending.iter())
        .collect();

    // At-least-once across processes: duplicates allowed, losses not
    let names: BTreeSet<&str> = all_records
        .iter()
        .filter_map(|record| record.get(TrackedField::Name))
        .collect();
    let expected: BTreeSet<String> = (0..200)
        .filter(|i| i % 2 == 1)
        .map(|i| format!("Shared {i}"))
        .collect();
    assert!(expected.iter().all(|name| names.contains(name.as_str())));

    let unchanged = all_records.iter().filter(|record| !record.has_changes()).count();
    assert!(unchanged >= 100, "only {unchanged} of 100 identity-only records accounted for");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn held_mutations_all_accumulate() {
    let queue = Arc::new(InMemoryQueue::new("subscribers").with_background_depth(3));
    let coalescer = Arc::new(
        ChangeCoalescer::new(
            &RelayConfig::default(),
            Arc::new(MemoryStore::new()),
            queue.clone(),
        )
        .unwrap(),
    );

    let tasks = (0..150).map(|i| {
        let coalescer = coalescer.clone();
        async move { coalescer.observe(&name_change(&identity(i), "Held")).await }
    });
    let outcomes = join_all(tasks).await;

    assert!(outcomes.iter().all(Option::is_some));
    assert!(queue.is_empty());
    assert_eq!(coalescer.store().load_pending().await.unwrap().len(), 150);
}
