// tests/integration/session_test.rs

//! Tests for per-connection behavior: HELLO negotiation, response shaping,
//! the whole-document commands and vbucket routing.

use super::test_helpers::TestContext;
use bytes::Bytes;
use std::sync::Arc;
use subdocd::core::protocol::hello::{FEATURE_DATATYPE, FEATURE_JSON, FEATURE_MUTATION_SEQNO};
use subdocd::core::protocol::subdoc::decode_mutation_extras;
use subdocd::core::protocol::{Features, Opcode, Request, Status};
use subdocd::core::storage::vbucket::{VbucketMap, vbucket_for_key};
use subdocd::core::storage::{DATATYPE_JSON, MAX_DOCUMENT_SIZE, MemoryEngine};

#[tokio::test]
async fn test_hello_enables_known_features_only() {
    let mut ctx = TestContext::new();
    let enabled = ctx
        .hello(&[FEATURE_JSON, 0x7fff, FEATURE_MUTATION_SEQNO, 0x02])
        .await;

    assert_eq!(enabled, vec![FEATURE_MUTATION_SEQNO, FEATURE_JSON]);
    assert_eq!(
        ctx.session.features,
        Features::MUTATION_SEQNO | Features::JSON
    );
    assert_eq!(ctx.session.agent.as_deref(), Some("subdocd-tests"));

    // A later HELLO replaces the earlier negotiation.
    assert_eq!(ctx.hello(&[FEATURE_DATATYPE]).await, vec![FEATURE_DATATYPE]);
    assert_eq!(ctx.session.features, Features::DATATYPE);
}

#[tokio::test]
async fn test_hello_rejects_malformed_bodies() {
    let mut ctx = TestContext::new();

    let odd = Request::new(Opcode::Hello).with_value(Bytes::from_static(&[0, 1, 0]));
    assert_eq!(ctx.send_raw(odd).await.status, Status::Einval);

    let extras = Request::new(Opcode::Hello).with_extras(Bytes::from_static(&[0; 4]));
    assert_eq!(ctx.send_raw(extras).await.status, Status::Einval);
    assert_eq!(ctx.session.features, Features::empty());
}

#[tokio::test]
async fn test_mutation_tokens_need_negotiation() {
    let mut ctx = TestContext::new();
    ctx.store("doc", r#"{"n":0}"#).await;

    let response = ctx.subdoc(Opcode::SubdocCounter, "doc", "n", "1", 0).await;
    assert!(response.extras.is_empty());

    ctx.hello(&[FEATURE_MUTATION_SEQNO]).await;
    let first = ctx.subdoc(Opcode::SubdocCounter, "doc", "n", "1", 0).await;
    let second = ctx
        .multi_mutation("doc", &[(Opcode::SubdocCounter, "n", "1", 0)], 0)
        .await;

    let first = decode_mutation_extras(&first.extras).unwrap();
    let second = decode_mutation_extras(&second.extras).unwrap();
    assert_eq!(first.vbucket_uuid, second.vbucket_uuid);
    assert!(second.seqno > first.seqno);

    // Lookups never carry a token.
    assert!(ctx.get("doc", "n").await.extras.is_empty());
}

#[tokio::test]
async fn test_json_datatype_needs_negotiation() {
    let mut ctx = TestContext::new();
    ctx.store("doc", r#"{"a":[1]}"#).await;

    assert_eq!(ctx.get("doc", "a").await.datatype, 0);
    assert_eq!(ctx.fetch("doc").await.datatype, 0);

    ctx.hello(&[FEATURE_JSON]).await;
    assert_eq!(ctx.get("doc", "a").await.datatype, DATATYPE_JSON);
    assert_eq!(ctx.fetch("doc").await.datatype, DATATYPE_JSON);
}

#[tokio::test]
async fn test_other_datatype_bits_need_datatype_feature() {
    let mut plain = TestContext::new();
    plain.store_raw("raw", b"abc", 0x02).await;
    plain.store("doc", r#"{"a":1}"#).await;
    assert_eq!(plain.fetch("raw").await.datatype, 0);

    let mut datatype = TestContext::with_engine(plain.engine.clone());
    datatype.hello(&[FEATURE_DATATYPE]).await;
    assert_eq!(datatype.fetch("raw").await.datatype, 0x02);
    assert_eq!(datatype.fetch("doc").await.datatype, 0);

    let mut both = TestContext::with_engine(plain.engine.clone());
    both.hello(&[FEATURE_DATATYPE, FEATURE_JSON]).await;
    assert_eq!(both.fetch("raw").await.datatype, 0x02);
    assert_eq!(both.fetch("doc").await.datatype, DATATYPE_JSON);
}

#[tokio::test]
async fn test_set_get_delete() {
    let mut ctx = TestContext::new();
    let first = ctx
        .store_with("doc", b"{}", DATATYPE_JSON, 0x0102_0304, 0)
        .await;

    let fetched = ctx.fetch("doc").await;
    assert_eq!(fetched.status, Status::Success);
    assert_eq!(fetched.cas, first.cas);
    assert_eq!(&fetched.extras[..], &[1, 2, 3, 4]);
    assert_eq!(&fetched.value[..], b"{}");

    // A stale CAS loses, the current one wins.
    let stale = Request::new(Opcode::Delete)
        .with_key(Bytes::from_static(b"doc"))
        .with_cas(first.cas + 100);
    assert_eq!(ctx.send(stale).await.status, Status::KeyEexists);

    let delete = Request::new(Opcode::Delete)
        .with_key(Bytes::from_static(b"doc"))
        .with_cas(first.cas);
    assert_eq!(ctx.send(delete.clone()).await.status, Status::Success);
    assert_eq!(ctx.fetch("doc").await.status, Status::KeyENoent);
    assert_eq!(ctx.send(delete).await.status, Status::KeyENoent);
}

#[tokio::test]
async fn test_set_with_cas() {
    let mut ctx = TestContext::new();
    let first = ctx.store("doc", "[]").await;

    let extras = Bytes::from_static(&[0; 8]);
    let guarded = |cas: u64| {
        Request::new(Opcode::Set)
            .with_key(Bytes::from_static(b"doc"))
            .with_extras(extras.clone())
            .with_value(Bytes::from_static(b"[1]"))
            .with_datatype(DATATYPE_JSON)
            .with_cas(cas)
    };
    assert_eq!(ctx.send(guarded(first.cas + 1)).await.status, Status::KeyEexists);
    assert_eq!(ctx.send(guarded(first.cas)).await.status, Status::Success);
    assert_eq!(ctx.fetch_json("doc").await, serde_json::json!([1]));

    let missing = Request::new(Opcode::Set)
        .with_key(Bytes::from_static(b"nope"))
        .with_extras(extras)
        .with_value(Bytes::from_static(b"1"))
        .with_cas(5);
    assert_eq!(ctx.send(missing).await.status, Status::KeyENoent);
}

#[tokio::test]
async fn test_kv_request_validation() {
    let mut ctx = TestContext::new();

    let no_extras = Request::new(Opcode::Set)
        .with_key(Bytes::from_static(b"k"))
        .with_value(Bytes::from_static(b"1"));
    assert_eq!(ctx.send(no_extras).await.status, Status::Einval);

    let too_big = Request::new(Opcode::Set)
        .with_key(Bytes::from_static(b"k"))
        .with_extras(Bytes::from_static(&[0; 8]))
        .with_value(vec![b' '; MAX_DOCUMENT_SIZE + 1]);
    assert_eq!(ctx.send(too_big).await.status, Status::E2big);

    let no_key = Request::new(Opcode::Get);
    assert_eq!(ctx.send(no_key).await.status, Status::Einval);

    let noop = Request::new(Opcode::Noop);
    assert_eq!(ctx.send_raw(noop).await.status, Status::Success);
    let noop_with_body = Request::new(Opcode::Noop).with_value(Bytes::from_static(b"x"));
    assert_eq!(ctx.send_raw(noop_with_body).await.status, Status::Einval);
}

#[tokio::test]
async fn test_unknown_opcode() {
    let mut ctx = TestContext::new();
    let mut request = Request::new(Opcode::Noop);
    request.opcode = 0x99;
    let response = ctx.send_raw(request).await;
    assert_eq!(response.status, Status::UnknownCommand);
    assert_eq!(response.opcode, 0x99);
}

#[tokio::test]
async fn test_responses_echo_the_opcode() {
    let mut ctx = TestContext::new();
    ctx.store("doc", "{}").await;
    let response = ctx.exists("doc", "missing").await;
    assert_eq!(response.opcode, Opcode::SubdocExists.as_u8());
    assert_eq!(response.status, Status::SubdocPathENoent);
    assert!(response.key.is_empty());
}

#[tokio::test]
async fn test_unowned_vbucket_is_not_my_vbucket() {
    let num_vbuckets = 1024;
    let owned_vb = vbucket_for_key(b"doc", num_vbuckets);
    let engine = Arc::new(MemoryEngine::with_vbucket_map(VbucketMap::with_owned(
        num_vbuckets,
        &[owned_vb],
    )));
    let mut ctx = TestContext::with_engine(engine);
    ctx.store("doc", r#"{"a":1}"#).await;

    let elsewhere = (owned_vb + 1) % num_vbuckets;
    let lookup = subdocd::core::protocol::subdoc::SinglePathFrame {
        key: Bytes::from_static(b"doc"),
        path: Bytes::from_static(b"a"),
        value: Bytes::new(),
        flags: 0,
        expiry: None,
    }
    .into_request(Opcode::SubdocGet);

    let response = ctx.send_raw(lookup.clone().with_vbucket(elsewhere)).await;
    assert_eq!(response.status, Status::NotMyVbucket);

    // Vbucket ids past the end of the map are not owned either.
    let response = ctx.send_raw(lookup.clone().with_vbucket(u16::MAX)).await;
    assert_eq!(response.status, Status::NotMyVbucket);

    let response = ctx.send_raw(lookup.with_vbucket(owned_vb)).await;
    assert_eq!(response.status, Status::Success);
    assert_eq!(&response.value[..], b"1");
}
