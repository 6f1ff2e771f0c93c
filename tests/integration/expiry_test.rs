// tests/integration/expiry_test.rs

//! Tests for document expiry: conversion of wire values, preservation across
//! sub-document mutations, and lazy expiration in the engine.

use super::test_helpers::TestContext;
use bytes::Bytes;
use std::sync::Arc;
use subdocd::core::errors::StorageError;
use subdocd::core::protocol::{Opcode, Status};
use subdocd::core::storage::expiry::{RELATIVE_EXPIRY_LIMIT, is_expired, to_absolute, unix_now};
use subdocd::core::storage::{DATATYPE_JSON, MemoryEngine, StorageEngine, StoreRequest};

#[test]
fn test_to_absolute() {
    let now = 1_700_000_000;
    assert_eq!(to_absolute(0, now), None);
    assert_eq!(to_absolute(60, now), Some(now + 60));
    assert_eq!(
        to_absolute(RELATIVE_EXPIRY_LIMIT, now),
        Some(now + u64::from(RELATIVE_EXPIRY_LIMIT))
    );
    assert_eq!(
        to_absolute(RELATIVE_EXPIRY_LIMIT + 1, now),
        Some(u64::from(RELATIVE_EXPIRY_LIMIT + 1))
    );
}

#[test]
fn test_is_expired() {
    assert!(!is_expired(None, 100));
    assert!(!is_expired(Some(101), 100));
    assert!(is_expired(Some(100), 100));
}

async fn stored_expiry(engine: &MemoryEngine, ctx: &TestContext, key: &str) -> Option<u64> {
    let vbucket =
        subdocd::core::storage::vbucket::vbucket_for_key(key.as_bytes(), ctx.num_vbuckets);
    engine.load(vbucket, key.as_bytes()).await.unwrap().expiry
}

#[tokio::test]
async fn test_mutation_keeps_expiry_and_flags() {
    let engine = Arc::new(MemoryEngine::new(1024));
    let mut ctx = TestContext::with_engine(engine.clone());
    ctx.store_with("doc", br#"{"n":1}"#, DATATYPE_JSON, 0xcafe, 3600)
        .await;
    let before = stored_expiry(&engine, &ctx, "doc").await;
    assert!(before.is_some());

    ctx.subdoc(Opcode::SubdocCounter, "doc", "n", "1", 0).await;

    assert_eq!(stored_expiry(&engine, &ctx, "doc").await, before);
    let fetched = ctx.fetch("doc").await;
    assert_eq!(&fetched.extras[..], &0xcafe_u32.to_be_bytes());
}

#[tokio::test]
async fn test_mutation_with_expiry_replaces_it() {
    let engine = Arc::new(MemoryEngine::new(1024));
    let mut ctx = TestContext::with_engine(engine.clone());
    ctx.store("doc", r#"{"n":1}"#).await;
    assert_eq!(stored_expiry(&engine, &ctx, "doc").await, None);

    let response = ctx
        .subdoc_with(Opcode::SubdocDictUpsert, "doc", "m", "2", 0, 0, Some(600))
        .await;
    assert_eq!(response.status, Status::Success);

    let expiry = stored_expiry(&engine, &ctx, "doc").await.unwrap();
    let now = unix_now();
    assert!(expiry > now && expiry <= now + 600);
}

#[tokio::test]
async fn test_expired_documents_are_not_found() {
    let engine = MemoryEngine::new(4);
    let past = StoreRequest {
        value: Bytes::from_static(br#"{"a":1}"#),
        datatype: DATATYPE_JSON,
        expected_cas: None,
        flags: 0,
        expiry: Some(unix_now() - 10),
    };
    engine.store(1, b"old", past).await.unwrap();
    assert_eq!(engine.len(), 1);

    assert_eq!(engine.load(1, b"old").await.unwrap_err(), StorageError::NotFound);
    assert!(engine.is_empty());
    assert_eq!(
        engine.remove(1, b"old", None).await.unwrap_err(),
        StorageError::NotFound
    );
}

#[tokio::test]
async fn test_expired_document_cannot_be_cas_updated() {
    let engine = MemoryEngine::new(4);
    let info = engine
        .store(
            0,
            b"k",
            StoreRequest {
                value: Bytes::from_static(b"{}"),
                datatype: DATATYPE_JSON,
                expected_cas: None,
                flags: 0,
                expiry: Some(unix_now() - 1),
            },
        )
        .await
        .unwrap();

    let update = StoreRequest {
        value: Bytes::from_static(b"[]"),
        datatype: DATATYPE_JSON,
        expected_cas: Some(info.cas),
        flags: 0,
        expiry: None,
    };
    assert_eq!(
        engine.store(0, b"k", update).await.unwrap_err(),
        StorageError::NotFound
    );
}
