// tests/property_test.rs

//! Property-based coverage of the stream store's ordering invariant: no
//! matter what sequence of explicit IDs is appended, only a strictly
//! increasing subsequence is ever accepted, and the accepted IDs come back
//! out of `xrange` in the same order they went in.

use bytes::Bytes;
use ferrite::core::storage::{IdSpec, StreamId, StreamStore};
use indexmap::IndexMap;
use proptest::prelude::*;

fn fields() -> IndexMap<Bytes, Bytes> {
    let mut m = IndexMap::new();
    m.insert(Bytes::from_static(b"field"), Bytes::from_static(b"value"));
    m
}

proptest! {
    #[test]
    fn only_strictly_increasing_ids_are_ever_accepted(
        ids in prop::collection::vec((0u64..50, 0u64..5), 1..60)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = StreamStore::new();
            let key = Bytes::from_static(b"s");
            let mut last_accepted: Option<StreamId> = None;

            for (ms, seq) in &ids {
                let id = StreamId::new(*ms, *seq);
                let result = store.xadd(&key, IdSpec::Full(id), fields()).await;

                let should_accept = id != StreamId::MIN
                    && match last_accepted {
                        Some(last) => id > last,
                        None => true,
                    };

                match result {
                    Ok(accepted_id) => {
                        prop_assert!(should_accept);
                        prop_assert_eq!(accepted_id, id);
                        last_accepted = Some(id);
                    }
                    Err(_) => {
                        prop_assert!(!should_accept);
                    }
                }
            }

            let all = store.xrange(&key, StreamId::MIN, StreamId::MAX).await;
            let returned_ids: Vec<StreamId> = all.iter().map(|e| e.id).collect();
            let mut sorted = returned_ids.clone();
            sorted.sort();
            prop_assert_eq!(returned_ids, sorted);

            for pair in all.windows(2) {
                prop_assert!(pair[0].id < pair[1].id);
            }
        })?;
    }
}
