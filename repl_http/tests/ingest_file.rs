//! End-to-end exercise of `POST /ingest/file` through the real router,
//! handler, and envelope stack: scenario 3 (ingest sync) from the external
//! interface surface.

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use hyper::{Body, Request};
use repl_backoff::BackoffConfig;
use repl_config::Configuration;
use repl_controller::Controller;
use repl_http::{AppState, AuthKeys};
use repl_ingest::{ContributionLoader, IngestManager};
use repl_messenger::{MessengerError, Transport};
use repl_store::{DatabaseServices, MemDatabaseServices};
use repl_time::{MockProvider, Time};
use repl_types::{
    ChunkNumber, Column, ControllerId, Database, DatabaseFamily, DatabaseName, FamilyName, HostPort, Table,
    TableName, Transaction, TransactionId, TransactionState, Worker, WorkerName,
};

#[derive(Debug)]
struct DeadTransport;

#[async_trait]
impl Transport for DeadTransport {
    async fn send(&self, _worker: &WorkerName, _body: bytes::Bytes) -> Result<bytes::Bytes, MessengerError> {
        Err(MessengerError::ChannelClosed)
    }

    async fn send_stop(&self, _worker: &WorkerName, _target_request_id: &str) -> Result<(), MessengerError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct NoopLoader;

#[async_trait]
impl ContributionLoader for NoopLoader {
    async fn load(
        &self,
        _worker: &Worker,
        _table: &TableName,
        _chunk: ChunkNumber,
        _is_overlap: bool,
        _dialect: &repl_types::Dialect,
        _batch: &[u8],
    ) -> Result<(), repl_ingest::IngestError> {
        Ok(())
    }
}

fn worker(name: &str) -> Worker {
    Worker {
        name: WorkerName::from(name),
        enabled: true,
        read_only: false,
        svc: HostPort::new("localhost", 25000),
        fs: HostPort::new("localhost", 25001),
        data_dir: "/data".into(),
        loader: HostPort::new("localhost", 25002),
        loader_tmp_dir: "/tmp/loader".into(),
        exporter: HostPort::new("localhost", 25003),
        exporter_tmp_dir: "/tmp/exporter".into(),
        http_loader: HostPort::new("localhost", 25004),
        http_loader_tmp_dir: "/tmp/http_loader".into(),
    }
}

async fn build_state() -> (Arc<AppState>, Arc<MemDatabaseServices>, TransactionId) {
    let config = Configuration::new();
    config.add_worker(worker("w1")).unwrap();
    config
        .add_family(DatabaseFamily { name: FamilyName::from("F"), min_replicas: 1, max_replicas: 1 })
        .unwrap();
    config
        .add_database(Database {
            name: DatabaseName::from("D"),
            family: FamilyName::from("F"),
            tables: vec![Table { name: "Object".into(), columns: vec![Column { name: "objectId".into() }], partitioning: None }],
        })
        .unwrap();
    let config = Arc::new(config);

    let mem = Arc::new(MemDatabaseServices::new());
    let time = Arc::new(MockProvider::new(Time::from_millis(0)));

    let transaction_id = TransactionId::new(42);
    mem.begin_transaction(Transaction {
        id: transaction_id,
        database: DatabaseName::from("D"),
        state: TransactionState::Started,
        begin_time: time.now(),
        end_time: None,
        context: String::new(),
    })
    .await
    .unwrap();

    let controller = Controller::start(
        ControllerId::new(1),
        "localhost",
        config.clone(),
        mem.clone(),
        Arc::new(DeadTransport),
        time.clone(),
    )
    .await
    .unwrap();

    let ingest = IngestManager::start(mem.clone(), config, Arc::new(NoopLoader), time, BackoffConfig::default(), 2);
    let auth = AuthKeys::new("test-key", "test-admin-key");
    let state = AppState::new(Arc::new(controller), mem.clone(), ingest, auth);
    (state, mem, transaction_id)
}

#[tokio::test]
async fn ingest_file_loads_rows_and_marks_the_contribution_finished() {
    let (state, store, transaction_id) = build_state().await;
    let dir = repl_test_helpers::tmp_dir();
    let path = dir.path().join("chunk_123.txt");
    tokio::fs::write(&path, b"1\t2\n3\t4\n5\t6\n").await.unwrap();
    let url = format!("file://{}", path.display());

    let router = repl_http::build_router();
    let body = serde_json::json!({
        "transaction_id": transaction_id.get(),
        "worker": "w1",
        "table": "Object",
        "chunk": 123,
        "is_overlap": false,
        "url": url,
    });
    let req = Request::builder()
        .method(Method::POST)
        .uri("/ingest/file")
        .header("x-auth-key", "test-key")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (handler, auth, params) = router.resolve(&Method::POST, "/ingest/file").unwrap();
    state.auth.check(auth, Some("test-key")).unwrap();
    let response = handler(state.clone(), req, params).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(parsed["success"], 1);
    assert_eq!(parsed["status"], "Finished");
    assert!(parsed["num_rows"].as_u64().unwrap() > 0, "expected num_rows > 0, got {parsed}");

    let contributions = store.find_contributions_in_transaction(transaction_id).await.unwrap();
    assert_eq!(contributions.len(), 1);
    assert_eq!(contributions[0].status, repl_types::ContributionStatus::Finished);
}

#[tokio::test]
async fn ingest_file_without_a_key_is_rejected_before_reaching_the_handler() {
    let (state, _store, _transaction_id) = build_state().await;
    let router = repl_http::build_router();
    let (_handler, auth, _params) = router.resolve(&Method::POST, "/ingest/file").unwrap();
    assert!(state.auth.check(auth, None).is_err());
    assert!(state.auth.check(auth, Some("wrong-key")).is_err());
    assert!(state.auth.check(auth, Some("test-key")).is_ok());
}
