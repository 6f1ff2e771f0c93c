// tests/property/mutation_property_test.rs

//! Property-based tests for mutation invariants: atomicity, counter
//! arithmetic and read-your-writes.

use crate::test_helpers::TestContext;
use proptest::prelude::*;
use subdocd::core::protocol::{Opcode, Status};

fn primitive() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        "[a-z ]{0,12}".prop_map(|s| format!("\"{s}\"")),
        any::<bool>().prop_map(|b| b.to_string()),
        Just("null".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_upsert_then_get_returns_the_value(
        key in "[a-z]{1,8}",
        value in primitive(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut ctx = TestContext::new();
            ctx.store("doc", r#"{"fixed":1}"#).await;

            let path = format!("nested.{key}");
            let response = ctx
                .subdoc(Opcode::SubdocDictUpsert, "doc", &path, &value, 0x01)
                .await;
            assert_eq!(response.status, Status::Success);

            let response = ctx.get("doc", &path).await;
            assert_eq!(response.status, Status::Success);
            assert_eq!(String::from_utf8_lossy(&response.value), value);
        });
    }

    #[test]
    fn test_counter_matches_the_sum_of_deltas(
        deltas in prop::collection::vec(
            (-1_000_000i64..1_000_000).prop_filter("nonzero", |d| *d != 0),
            1..20
        )
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut ctx = TestContext::new();
            ctx.store("doc", "{}").await;

            let mut expected = 0i64;
            for delta in &deltas {
                expected += delta;
                let response = ctx
                    .subdoc(Opcode::SubdocCounter, "doc", "n", &delta.to_string(), 0)
                    .await;
                assert_eq!(response.status, Status::Success);
                assert_eq!(response.value, expected.to_string());
            }
            assert_eq!(ctx.fetch_json("doc").await["n"], serde_json::json!(expected));
        });
    }

    #[test]
    fn test_failed_batch_leaves_the_document_untouched(
        good in prop::collection::vec(("[a-z]{1,6}", primitive()), 0..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut ctx = TestContext::new();
            let stored = ctx.store("doc", r#"{"keep":[1,2,3]}"#).await;
            let before = ctx.fetch("doc").await.value;

            let mut specs: Vec<(Opcode, &str, &str, u8)> = good
                .iter()
                .map(|(key, value)| (Opcode::SubdocDictUpsert, key.as_str(), value.as_str(), 0))
                .collect();
            // Replacing a missing path always fails.
            specs.push((Opcode::SubdocReplace, "missing.path", "0", 0));

            let response = ctx.multi_mutation("doc", &specs, 0).await;
            assert_eq!(response.status, Status::SubdocMultiPathFailure);

            let after = ctx.fetch("doc").await;
            assert_eq!(after.cas, stored.cas);
            assert_eq!(after.value, before);
        });
    }
}
