use std::time::{Duration, Instant};

use super::runtime::{async_sleep, block_on};
use crate::{MemoryStore, SortedSetStore, TimebucketError};

fn entries(values: &[(&str, f64)]) -> Vec<(String, f64)> {
    values.iter().map(|(m, s)| (m.to_string(), *s)).collect()
}

#[test]
fn add_if_absent_keeps_the_first_score() {
    block_on(async {
        let store = MemoryStore::new();

        assert!(store.add_if_absent("k", "a", 1.0).await.unwrap());
        assert!(!store.add_if_absent("k", "a", 5.0).await.unwrap());

        assert_eq!(store.cardinality("k").await.unwrap(), 1);
        assert_eq!(
            store.peek_max("k").await.unwrap(),
            Some(("a".to_string(), 1.0))
        );
    });
}

#[test]
fn pop_min_orders_by_score_then_member() {
    block_on(async {
        let store = MemoryStore::new();

        store
            .add_many("k", &entries(&[("b", 2.0), ("z", 1.0), ("a", 2.0), ("c", -1.0)]))
            .await
            .unwrap();

        let popped = store.pop_min("k", 3).await.unwrap();
        assert_eq!(popped, entries(&[("c", -1.0), ("z", 1.0), ("a", 2.0)]));

        let popped = store.pop_min("k", 3).await.unwrap();
        assert_eq!(popped, entries(&[("b", 2.0)]));

        assert!(store.pop_min("k", 3).await.unwrap().is_empty());
        assert!(store.pop_min("missing", 3).await.unwrap().is_empty());
    });
}

#[test]
fn add_many_overwrites_scores_and_counts_new_members() {
    block_on(async {
        let store = MemoryStore::new();

        store.add_if_absent("k", "a", 1.0).await.unwrap();
        let added = store
            .add_many("k", &entries(&[("a", 10.0), ("b", 2.0)]))
            .await
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(
            store.pop_min("k", 2).await.unwrap(),
            entries(&[("b", 2.0), ("a", 10.0)])
        );
        assert_eq!(store.add_many("k", &[]).await.unwrap(), 0);
    });
}

#[test]
fn remove_lowest_and_remove_below() {
    block_on(async {
        let store = MemoryStore::new();
        store
            .add_many(
                "k",
                &entries(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]),
            )
            .await
            .unwrap();

        assert_eq!(store.remove_lowest("k", 0).await.unwrap(), 0);
        assert_eq!(store.remove_lowest("k", 2).await.unwrap(), 2);
        assert_eq!(store.cardinality("k").await.unwrap(), 3);

        // exclusive upper bound: 4.0 stays
        assert_eq!(store.remove_below("k", 4.0).await.unwrap(), 1);
        assert_eq!(
            store.pop_min("k", 10).await.unwrap(),
            entries(&[("d", 4.0), ("e", 5.0)])
        );

        assert_eq!(store.remove_lowest("missing", 5).await.unwrap(), 0);
        assert_eq!(store.remove_below("missing", 5.0).await.unwrap(), 0);
    });
}

#[test]
fn empty_sets_are_dropped() {
    block_on(async {
        let store = MemoryStore::new();

        store.add_if_absent("k", "a", 1.0).await.unwrap();
        assert_eq!(store.sets().len(), 1);
        assert_eq!(store.sets().get("k").map(|set| set.len()), Some(1));

        store.pop_min("k", 1).await.unwrap();
        assert_eq!(store.sets().len(), 0);

        store.add_if_absent("k", "a", 1.0).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.cardinality("k").await.unwrap(), 0);
        assert_eq!(store.peek_max("k").await.unwrap(), None);
    });
}

#[test]
fn clones_share_state() {
    block_on(async {
        let store = MemoryStore::new();
        let other = store.clone();

        store.add_if_absent("k", "a", 1.0).await.unwrap();

        assert_eq!(other.cardinality("k").await.unwrap(), 1);
        assert!(!other.add_if_absent("k", "a", 1.0).await.unwrap());
    });
}

#[test]
fn blocking_pop_returns_immediately_when_not_empty() {
    block_on(async {
        let store = MemoryStore::new();
        store.add_if_absent("k", "a", 1.0).await.unwrap();

        let start = Instant::now();
        let popped = store
            .blocking_pop_min("k", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(popped, Some(("a".to_string(), 1.0)));
        assert!(start.elapsed() < Duration::from_secs(1));
    });
}

#[test]
fn blocking_pop_ignores_inserts_on_other_keys() {
    block_on(async {
        let store = MemoryStore::new();

        let writer = store.clone();
        tokio::spawn(async move {
            async_sleep(Duration::from_millis(100)).await;
            writer.add_if_absent("other", "x", 1.0).await.unwrap();
        });

        let start = Instant::now();
        let popped = store
            .blocking_pop_min("k", Duration::from_millis(400))
            .await
            .unwrap();

        assert_eq!(popped, None);
        assert!(start.elapsed() >= Duration::from_millis(400));
        assert_eq!(store.cardinality("other").await.unwrap(), 1);
    });
}

#[test]
fn blocking_pop_wakes_on_add_many() {
    block_on(async {
        let store = MemoryStore::new();

        let writer = store.clone();
        tokio::spawn(async move {
            async_sleep(Duration::from_millis(100)).await;
            writer
                .add_many("k", &[("a".to_string(), 3.0)])
                .await
                .unwrap();
        });

        let start = Instant::now();
        let popped = store
            .blocking_pop_min("k", Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(popped, Some(("a".to_string(), 3.0)));
        assert!(start.elapsed() < Duration::from_secs(1));
    });
}

#[test]
fn non_finite_scores_are_rejected() {
    block_on(async {
        let store = MemoryStore::new();

        for score in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = store.add_if_absent("k", "a", score).await.unwrap_err();
            assert!(matches!(
                err,
                TimebucketError::InvalidScore { ref member, .. } if member == "a"
            ));
        }
        assert_eq!(store.cardinality("k").await.unwrap(), 0);
        assert_eq!(store.sets().len(), 0);

        let err = store
            .add_many("k", &entries(&[("a", 1.0), ("b", f64::NAN)]))
            .await
            .unwrap_err();
        assert!(matches!(err, TimebucketError::InvalidScore { ref member, .. } if member == "b"));
        assert_eq!(store.cardinality("k").await.unwrap(), 0);
    });
}

#[test]
fn blocking_pop_with_unbounded_timeout_waits_for_insert() {
    block_on(async {
        let store = MemoryStore::new();

        let writer = store.clone();
        tokio::spawn(async move {
            async_sleep(Duration::from_millis(100)).await;
            writer.add_if_absent("k", "a", 1.0).await.unwrap();
        });

        let popped = tokio::time::timeout(
            Duration::from_secs(5),
            store.blocking_pop_min("k", Duration::MAX),
        )
        .await
        .expect("blocking pop should return once an entry is added")
        .unwrap();

        assert_eq!(popped, Some(("a".to_string(), 1.0)));
    });
}
