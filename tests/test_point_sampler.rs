//! Integration tests for `random_record` / `find_record`.
//!
//! The fake client answers only the exact queries it was primed with, so
//! every assertion on the call log also checks the composed query text.

mod common;

use std::sync::Arc;

use common::*;
use remote_sampler::{
    ClientHandle, ConnectionProvider, Engine, ErrorKind, FieldsSpec, Operation, QueryResult,
    SamplerConfig, SeededRandom, StepDescriptor, StepOutput,
};
use serde_json::json;

fn accounts(log: &CallLog) -> FakeClient {
    FakeClient::new(log.clone())
        .count("SELECT count() FROM Account", 10)
        .records("SELECT Id FROM Account LIMIT 1", vec![json!({"Id": "FAKEID0"})])
        .records("SELECT Id FROM Account LIMIT 1 OFFSET 0", vec![json!({"Id": "FAKEID0"})])
        .records("SELECT Id FROM Account LIMIT 1 OFFSET 5", vec![json!({"Id": "FAKEID5"})])
}

fn config() -> SamplerConfig {
    SamplerConfig::default().with_target_context("blah")
}

#[tokio::test]
async fn random_record_uses_drawn_offset() {
    let log = call_log();
    let handle = ClientHandle::new(Arc::new(accounts(&log)));
    let engine = engine_with_random(handle, &log, config(), FixedRandom(5));

    let id = engine.random_record("Account").await.unwrap();
    assert_eq!(id, "FAKEID5");
    assert_eq!(
        calls(&log),
        vec![
            "CONNECT blah",
            "SELECT count() FROM Account",
            "SELECT Id FROM Account LIMIT 1 OFFSET 5",
        ]
    );
}

#[tokio::test]
async fn find_record_returns_first_row() {
    let log = call_log();
    let handle = ClientHandle::new(Arc::new(accounts(&log)));
    let engine = engine_with_random(handle, &log, config(), FixedRandom(5));

    let id = engine.find_record("Account", None).await.unwrap();
    assert_eq!(id, "FAKEID0");
    // no count query and no randomness
    assert_eq!(calls(&log), vec!["CONNECT blah", "SELECT Id FROM Account LIMIT 1"]);
}

#[tokio::test]
async fn repeated_random_records_count_once() {
    let log = call_log();
    let handle = ClientHandle::new(Arc::new(accounts(&log)));
    let engine = engine_with_random(handle, &log, config(), FixedRandom(5));

    for _ in 0..3 {
        assert_eq!(engine.random_record("Account").await.unwrap(), "FAKEID5");
    }
    let log = calls(&log);
    assert_eq!(log.iter().filter(|c| c.starts_with("SELECT count()")).count(), 1);
    assert_eq!(log.iter().filter(|c| c.starts_with("CONNECT")).count(), 1);
    assert_eq!(engine.count_cache().stats().misses, 1);
    assert_eq!(engine.count_cache().stats().hits, 2);
}

#[tokio::test]
async fn seed_controls_the_offset() {
    // Every offset 0..10 resolves to a distinct id.
    let primed = |log: &CallLog| {
        let mut client = FakeClient::new(log.clone()).count("SELECT count() FROM Account", 10);
        for k in 0..10 {
            client = client.records(
                &format!("SELECT Id FROM Account LIMIT 1 OFFSET {k}"),
                vec![json!({"Id": format!("FAKEID{k}")})],
            );
        }
        ClientHandle::new(Arc::new(client))
    };

    let mut runs = Vec::new();
    for _ in 0..2 {
        let log = call_log();
        let engine = engine_for(primed(&log), &log, config().seed(1234));
        let mut ids = Vec::new();
        for _ in 0..8 {
            ids.push(engine.random_record("Account").await.unwrap().0);
        }
        runs.push(ids);
    }
    assert_eq!(runs[0], runs[1]);
    for id in &runs[0] {
        let k: u64 = id.trim_start_matches("FAKEID").parse().unwrap();
        assert!(k < 10);
    }

    // An explicit source with the same seed draws the same sequence.
    let log = call_log();
    let engine = Engine::with_random(
        config(),
        ConnectionProvider::new(Arc::new(FakeFactory::new(primed(&log), log.clone()))),
        SeededRandom::new(1234),
    );
    assert_eq!(engine.random_record("Account").await.unwrap().0, runs[0][0]);
}

#[tokio::test]
async fn zero_rows_is_empty_dataset() {
    let log = call_log();
    let client = FakeClient::new(log.clone())
        .count("SELECT count() FROM Account", 0)
        .respond("SELECT Id FROM Account LIMIT 1", QueryResult::with_records(vec![]));
    let engine = engine_with_random(ClientHandle::new(Arc::new(client)), &log, config(), FixedRandom(0));

    let err = engine.random_record("Account").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyDataset);
    // no point fetch after a zero count
    assert!(!calls(&log).iter().any(|c| c.contains("OFFSET")));

    let err = engine.find_record("Account", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyDataset);
}

#[tokio::test]
async fn find_record_pushes_filter() {
    let log = call_log();
    let client = FakeClient::new(log.clone()).records(
        "SELECT Id FROM Account WHERE Name = 'Company3' LIMIT 1",
        vec![json!({"attributes": {"type": "Account"}, "Id": "001C3"})],
    );
    let engine = engine_with_random(ClientHandle::new(Arc::new(client)), &log, config(), FixedRandom(0));

    let id = engine.find_record("Account", Some("Name = 'Company3'")).await.unwrap();
    assert_eq!(id, "001C3");
}

#[tokio::test]
async fn rejected_query_is_remote_query_error() {
    let log = call_log();
    let engine = engine_with_random(
        ClientHandle::new(Arc::new(FakeClient::new(log.clone()))),
        &log,
        config(),
        FixedRandom(0),
    );
    let err = engine.random_record("Nope__c").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteQueryError);
    assert!(err.to_string().contains("No mock response found"));
}

#[tokio::test]
async fn missing_context_fails_before_any_call() {
    let log = call_log();
    let handle = ClientHandle::new(Arc::new(accounts(&log)));
    let engine = engine_with_random(handle, &log, SamplerConfig::default(), FixedRandom(5));

    let err = engine.random_record("Account").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingConfiguration);

    let step = StepDescriptor::new(Operation::FindRecord, "Account");
    let err = engine.run_step(&step).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingConfiguration);

    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn unavailable_client_library_is_reported() {
    let log = call_log();
    let provider = ConnectionProvider::new(Arc::new(FakeFactory::unavailable(
        "remote client module cannot be loaded",
        log.clone(),
    )));
    let engine = Engine::with_random(config(), provider, FixedRandom(0));

    let err = engine.random_record("Account").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
    assert!(err.to_string().contains("remote client module cannot be loaded"));
}

#[tokio::test]
async fn point_steps_return_ids_or_records() {
    let log = call_log();
    let client = accounts(&log).records(
        "SELECT Id, Name FROM Account LIMIT 1",
        vec![json!({"Id": "FAKEID0", "Name": "Company", "Industry": "Retail"})],
    );
    let engine = engine_with_random(ClientHandle::new(Arc::new(client)), &log, config(), FixedRandom(5));

    let step = StepDescriptor::new(Operation::RandomRecord, "Account");
    match engine.run_step(&step).await.unwrap() {
        StepOutput::Id(id) => assert_eq!(id, "FAKEID5"),
        other => panic!("expected an id, got {other:?}"),
    }

    let step = StepDescriptor::new(Operation::FindRecord, "Account")
        .fields(FieldsSpec::List(vec!["Id".into(), "Name".into()]));
    match engine.run_step(&step).await.unwrap() {
        StepOutput::Record(rec) => {
            assert_eq!(rec.len(), 2);
            assert_eq!(rec.get("Name").and_then(|v| v.as_str()), Some("Company"));
        }
        other => panic!("expected a record, got {other:?}"),
    }
}

#[tokio::test]
async fn generate_rows_maps_point_ids_into_rows() {
    let log = call_log();
    let engine = engine_with_random(
        ClientHandle::new(Arc::new(accounts(&log))),
        &log,
        config(),
        FixedRandom(5),
    );
    let mut mapping = indexmap::IndexMap::new();
    mapping.insert("AccountId".to_string(), "Id".to_string());
    let step = StepDescriptor::new(Operation::RandomRecord, "Account")
        .fields(FieldsSpec::Mapping(mapping))
        .entity("Contact");

    let rows = engine.generate_rows(&step, 2).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.entity == "Contact" && r.text("AccountId") == Some("FAKEID5")));
}
