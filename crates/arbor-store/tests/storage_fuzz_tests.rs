//! Storage Layer Fuzzing Tests
//!
//! Property-based fuzzing of the memory backend: arbitrary bind names and
//! graph shapes must never panic, uniqueness must hold exactly on
//! `(parent, name)`, and closure counts must never go negative.

use std::sync::Arc;

use arbor_store::{MemoryBackend, RelationalStore};
use arbor_types::{Bind, ResourceKind, StoreError};
use proptest::prelude::*;

/// Generate arbitrary bind names, including hostile ones.
fn arb_bind_name() -> impl Strategy<Value = String> {
    prop_oneof![
        // Normal names
        "[a-zA-Z0-9_.-]{1,64}",
        // Very long names
        prop::collection::vec(any::<char>(), 64..256).prop_map(|v| v.into_iter().collect()),
        // Special characters
        "[!@#$%^&*(){}\\[\\];:'\"<>,.?/|\\\\]{1,32}",
        // Unicode
        "\\PC{1,32}",
        // Potential injection
        Just("'; DROP TABLE binds; --".to_string()),
        Just("../../etc/passwd".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Inserting arbitrary binds never panics; a name collides iff the
    /// same (parent, name) was inserted before in this run.
    #[test]
    fn fuzz_bind_inserts(names in prop::collection::vec(arb_bind_name(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryBackend::new());
            let mut txn = store.begin().await.unwrap();

            let parent = txn.insert_resource(ResourceKind::Collection, 0).await.unwrap();
            let mut seen = std::collections::HashSet::new();

            for name in &names {
                let child = txn.insert_resource(ResourceKind::Resource, 0).await.unwrap();
                let result = txn
                    .insert_bind(&Bind { parent_id: parent, child_id: child, name: name.clone() })
                    .await;
                if seen.insert(name.clone()) {
                    result.unwrap();
                } else {
                    assert!(matches!(result.unwrap_err(), StoreError::Conflict));
                }
            }

            // Every uniquely named bind is enumerable again.
            let listed = txn.binds_of_parent(parent).await.unwrap();
            assert_eq!(listed.len(), seen.len());
            txn.rollback().await.unwrap();
        });
    }

    /// Random closure increments followed by the same decrements restore an
    /// empty closure table; counts never dip below zero along the way.
    #[test]
    fn fuzz_closure_adjustments(
        pairs in prop::collection::vec((0i64..8, 0i64..8, 1i64..5), 1..30)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryBackend::new());
            let mut txn = store.begin().await.unwrap();

            for (anc, desc, delta) in &pairs {
                let count = txn.adjust_closure(*anc, *desc, *delta).await.unwrap();
                assert!(count > 0);
            }
            for (anc, desc, delta) in &pairs {
                let count = txn.adjust_closure(*anc, *desc, -delta).await.unwrap();
                assert!(count >= 0);
            }
            for (anc, desc, _) in &pairs {
                assert_eq!(txn.closure_count(*anc, *desc).await.unwrap(), 0);
            }
            txn.rollback().await.unwrap();
        });
    }

    /// Queueing arbitrary ids preserves FIFO order over the deduplicated
    /// sequence.
    #[test]
    fn fuzz_cleanup_queue_order(ids in prop::collection::vec(0i64..20, 1..50)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = Arc::new(MemoryBackend::new());
            let mut txn = store.begin().await.unwrap();

            let mut expected = Vec::new();
            for id in &ids {
                txn.enqueue_cleanup(*id).await.unwrap();
                if !expected.contains(id) {
                    expected.push(*id);
                }
            }

            let mut drained = Vec::new();
            while let Some(id) = txn.dequeue_cleanup().await.unwrap() {
                drained.push(id);
            }
            assert_eq!(drained, expected);
            txn.rollback().await.unwrap();
        });
    }
}
