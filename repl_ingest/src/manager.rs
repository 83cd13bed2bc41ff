use std::sync::Arc;

use hashbrown::HashMap;
use observability_deps::tracing::{debug, warn};
use parking_lot::Mutex;
use repl_backoff::BackoffConfig;
use repl_config::Configuration;
use repl_store::DatabaseServices;
use repl_time::TimeProvider;
use repl_tracker::IdGenerator;
use repl_types::{Contribution, ContributionId, ContributionStatus, TransactionId};
use snafu::OptionExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{IngestError, Result, TableNotRegisteredSnafu, TransactionNotStartedSnafu, WorkerUnavailableSnafu};
use crate::loader::ContributionLoader;
use crate::pipeline::{self, PipelineStats};
use crate::queue::Queue;
use crate::reader;
use crate::request::ContributionRequest;

/// Admission, queueing, and bounded-concurrency execution of
/// table-contribution ingest requests.
///
/// SYNC callers block on [`Self::submit_sync`]; the manager runs the
/// read-parse-load pipeline inline on their own task. ASYNC callers get a
/// [`ContributionId`] back immediately from [`Self::submit_async`] and the
/// contribution is executed by one of a fixed pool of worker tasks draining
/// `queue` by priority.
#[derive(Debug)]
pub struct IngestManager {
    store: Arc<dyn DatabaseServices>,
    config: Arc<Configuration>,
    loader: Arc<dyn ContributionLoader>,
    time_provider: Arc<dyn TimeProvider>,
    retry_backoff: BackoffConfig,
    contribution_ids: IdGenerator,
    queue: Arc<Queue>,
    in_flight: Mutex<HashMap<ContributionId, CancellationToken>>,
    retries: Mutex<HashMap<ContributionId, u32>>,
    workers: Mutex<JoinSet<()>>,
}

impl IngestManager {
    /// Builds the manager and immediately spawns `worker_pool_size` ASYNC
    /// worker tasks draining the shared queue, a fixed worker pool rather
    /// than spawning one task per request.
    pub fn start(
        store: Arc<dyn DatabaseServices>,
        config: Arc<Configuration>,
        loader: Arc<dyn ContributionLoader>,
        time_provider: Arc<dyn TimeProvider>,
        retry_backoff: BackoffConfig,
        worker_pool_size: usize,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            store,
            config,
            loader,
            time_provider,
            retry_backoff,
            contribution_ids: IdGenerator::starting_at(1),
            queue: Arc::new(Queue::new()),
            in_flight: Mutex::new(HashMap::new()),
            retries: Mutex::new(HashMap::new()),
            workers: Mutex::new(JoinSet::new()),
        });
        for _ in 0..worker_pool_size.max(1) {
            let worker = Arc::clone(&this);
            this.workers.lock().spawn(async move { worker.worker_loop().await });
        }
        this
    }

    /// Runs the pipeline on the caller's own task and returns the
    /// contribution in whatever terminal status it actually reached.
    /// Returns `Err` only when the request is rejected at admission or a
    /// store call itself fails, never for a terminal pipeline outcome.
    pub async fn submit_sync(&self, request: ContributionRequest) -> Result<Contribution> {
        self.admit(&request).await?;
        let id = ContributionId::new(self.contribution_ids.next() as i64);
        let contribution = new_contribution(id, &request, self.time_provider.now());
        self.store.save_contribution(contribution.clone()).await?;

        let cancel = CancellationToken::new();
        self.in_flight.lock().insert(id, cancel.clone());
        let worker = self
            .config
            .worker(&request.worker)
            .context(WorkerUnavailableSnafu { worker: request.worker.clone() })?;
        let outcome = pipeline::run(&contribution, &worker, &self.loader, &cancel).await;
        self.in_flight.lock().remove(&id);
        self.finalize(id, contribution, outcome).await
    }

    /// Persists the contribution and enqueues it; returns as soon as
    /// admission passes, before the pipeline runs.
    pub async fn submit_async(&self, request: ContributionRequest) -> Result<ContributionId> {
        self.admit(&request).await?;
        let id = ContributionId::new(self.contribution_ids.next() as i64);
        let contribution = new_contribution(id, &request, self.time_provider.now());
        self.store.save_contribution(contribution).await?;
        self.in_flight.lock().insert(id, CancellationToken::new());
        self.queue.push(id, request);
        Ok(id)
    }

    /// Cancels one contribution. A still-queued contribution is marked
    /// `CANCELLED` immediately; an in-flight one is cancelled at its next
    /// row-batch boundary.
    pub async fn cancel_contribution(&self, id: ContributionId) -> Result<()> {
        let was_queued = self.queue.remove(id);
        if let Some(token) = self.in_flight.lock().get(&id).cloned() {
            token.cancel();
        }
        if was_queued {
            self.in_flight.lock().remove(&id);
            self.retries.lock().remove(&id);
            self.store.update_contribution_status(id, ContributionStatus::Cancelled).await?;
        }
        Ok(())
    }

    /// Cancels every non-terminal contribution under `transaction_id`.
    pub async fn cancel_transaction(&self, transaction_id: TransactionId) -> Result<()> {
        let contributions = self.store.find_contributions_in_transaction(transaction_id).await?;
        for c in contributions {
            if !c.status.is_terminal() {
                self.cancel_contribution(c.id).await?;
            }
        }
        Ok(())
    }

    /// Cancels every in-flight contribution and stops the worker pool.
    /// Queued-but-undispatched contributions are left `IN_PROGRESS` in the
    /// store; a restarted process is expected to resubmit them.
    pub fn shutdown(&self) {
        for token in self.in_flight.lock().values() {
            token.cancel();
        }
        self.workers.lock().abort_all();
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    async fn admit(&self, request: &ContributionRequest) -> Result<()> {
        reader::check_scheme(&request.url)?;

        let transaction = self.store.find_transaction(request.transaction_id).await?;
        if !transaction.is_started() {
            return TransactionNotStartedSnafu { id: request.transaction_id }.fail();
        }

        self.config
            .worker(&request.worker)
            .filter(|w| w.enabled)
            .context(WorkerUnavailableSnafu { worker: request.worker.clone() })?;

        let database = self.config.database(&transaction.database).context(TableNotRegisteredSnafu {
            database: transaction.database.to_string(),
            table: request.table.to_string(),
        })?;
        if !database.tables.iter().any(|t| t.name == request.table) {
            return TableNotRegisteredSnafu {
                database: transaction.database.to_string(),
                table: request.table.to_string(),
            }
            .fail();
        }
        Ok(())
    }

    /// Exponential delay before re-queueing a `READ_FAILED` retry, derived
    /// directly from `retry_backoff`'s public fields: the per-retry
    /// re-queue model here doesn't fit `Backoff::next`'s tight-loop/jitter
    /// shape (that's for a single caller retrying in place), so this
    /// applies the same init/base/max schedule without the jitter term.
    fn retry_delay(&self, attempt: u32) -> std::time::Duration {
        let secs = self.retry_backoff.init_backoff.as_secs_f64() * self.retry_backoff.base.powi(attempt.saturating_sub(1) as i32);
        std::time::Duration::from_secs_f64(secs).min(self.retry_backoff.max_backoff)
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let (id, request) = self.queue.pop().await;
            self.execute(id, request).await;
        }
    }

    async fn execute(self: &Arc<Self>, id: ContributionId, request: ContributionRequest) {
        let Some(cancel) = self.in_flight.lock().get(&id).cloned() else {
            // Cancelled (and removed from in_flight/queue) between enqueue and dispatch.
            return;
        };
        let worker = match self.config.worker(&request.worker) {
            Some(w) => w,
            None => {
                warn!(contribution_id = %id, "worker disappeared before dispatch");
                self.in_flight.lock().remove(&id);
                let _ = self.store.update_contribution_status(id, ContributionStatus::LoadFailed).await;
                return;
            }
        };
        let contribution = match self.store.find_contribution(id).await {
            Ok(c) => c,
            Err(err) => {
                warn!(contribution_id = %id, %err, "failed to load contribution before execution");
                self.in_flight.lock().remove(&id);
                return;
            }
        };

        let outcome = pipeline::run(&contribution, &worker, &self.loader, &cancel).await;

        if let Err(IngestError::ReadFailed { .. }) = &outcome {
            let attempts = {
                let mut retries = self.retries.lock();
                let entry = retries.entry(id).or_insert(0);
                *entry += 1;
                *entry
            };
            if attempts < request.retry_budget {
                let delay = self.retry_delay(attempts);
                debug!(contribution_id = %id, attempts, delay_ms = delay.as_millis() as u64, "read failed, re-queueing");
                tokio::time::sleep(delay).await;
                self.in_flight.lock().insert(id, CancellationToken::new());
                self.queue.push(id, request);
                return;
            }
        }

        self.in_flight.lock().remove(&id);
        self.retries.lock().remove(&id);
        if let Err(err) = self.finalize(id, contribution, outcome).await {
            warn!(contribution_id = %id, %err, "failed to persist contribution terminal state");
        }
    }

    async fn finalize(
        &self,
        id: ContributionId,
        mut contribution: Contribution,
        outcome: std::result::Result<PipelineStats, IngestError>,
    ) -> Result<Contribution> {
        let (status, stats) = match outcome {
            Ok(stats) => (ContributionStatus::Finished, stats),
            Err(IngestError::Cancelled) => (ContributionStatus::Cancelled, PipelineStats::default()),
            Err(IngestError::ReadFailed { .. }) => (ContributionStatus::ReadFailed, PipelineStats::default()),
            Err(IngestError::LoadFailed { .. }) => (ContributionStatus::LoadFailed, PipelineStats::default()),
            Err(other) => return Err(other),
        };
        contribution.status = status;
        contribution.num_bytes = stats.num_bytes;
        contribution.num_rows = stats.num_rows;
        self.store.update_contribution_status(id, status).await?;
        Ok(contribution)
    }
}

fn new_contribution(id: ContributionId, request: &ContributionRequest, now: repl_time::Time) -> Contribution {
    Contribution {
        id,
        transaction_id: request.transaction_id,
        worker: request.worker.clone(),
        table: request.table.clone(),
        chunk: request.chunk,
        is_overlap: request.is_overlap,
        url: request.url.clone(),
        dialect: request.dialect,
        status: ContributionStatus::InProgress,
        num_bytes: 0,
        num_rows: 0,
        start_ms: now,
        read_ms: 0,
        load_ms: 0,
        warnings: Vec::new(),
        retries: 0,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use repl_config::Configuration;
    use repl_store::MemDatabaseServices;
    use repl_time::{MockProvider, Time, TimeProvider};
    use repl_types::{
        Column, ChunkNumber, Database, DatabaseFamily, DatabaseName, Dialect, FamilyName, HostPort, Table,
        Transaction, TransactionId, TransactionState, Worker, WorkerName,
    };
    use tokio::sync::Notify;

    use super::*;

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

    fn config_with(worker_name: &str, database: &str, table: &str) -> Arc<Configuration> {
        let config = Configuration::new();
        config.add_worker(worker(worker_name)).unwrap();
        config
            .add_family(DatabaseFamily {
                name: FamilyName::from("F"),
                min_replicas: 1,
                max_replicas: 1,
            })
            .unwrap();
        config
            .add_database(Database {
                name: DatabaseName::from(database),
                family: FamilyName::from("F"),
                tables: vec![Table {
                    name: table.into(),
                    columns: vec![Column { name: "objectId".into() }],
                    partitioning: None,
                }],
            })
            .unwrap();
        Arc::new(config)
    }

    async fn started_transaction(store: &MemDatabaseServices, database: &str, now: Time) -> TransactionId {
        let id = TransactionId::new(1);
        store
            .begin_transaction(Transaction {
                id,
                database: DatabaseName::from(database),
                state: TransactionState::Started,
                begin_time: now,
                end_time: None,
                context: String::new(),
            })
            .await
            .unwrap();
        id
    }

    fn request(transaction_id: TransactionId, url: String) -> ContributionRequest {
        ContributionRequest {
            transaction_id,
            worker: WorkerName::from("w1"),
            table: "Object".into(),
            chunk: ChunkNumber::new(1),
            is_overlap: false,
            url,
            dialect: Dialect::default(),
            priority: 0,
            retry_budget: 2,
        }
    }

    fn csv_file(contents: &str) -> (tempfile::TempDir, String) {
        let dir = repl_test_helpers::tmp_dir();
        let path = dir.path().join("contribution.csv");
        std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        let url = format!("file://{}", path.display());
        (dir, url)
    }

    #[derive(Debug, Default)]
    struct RecordingLoader {
        calls: parking_lot::Mutex<u32>,
    }

    #[async_trait]
    impl ContributionLoader for RecordingLoader {
        async fn load(
            &self,
            _worker: &Worker,
            _table: &repl_types::TableName,
            _chunk: ChunkNumber,
            _is_overlap: bool,
            _dialect: &Dialect,
            _batch: &[u8],
        ) -> Result<(), IngestError> {
            *self.calls.lock() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn submit_sync_loads_every_row() {
        let mem = Arc::new(MemDatabaseServices::new());
        let store: Arc<dyn DatabaseServices> = mem.clone();
        let config = config_with("w1", "D", "Object");
        let time: Arc<dyn TimeProvider> = Arc::new(MockProvider::new(Time::from_millis(0)));
        let transaction_id = started_transaction(&mem, "D", time.now()).await;
        let (_dir, url) = csv_file("1\t2\n3\t4\n5\t6\n");
        let loader: Arc<dyn ContributionLoader> = Arc::new(RecordingLoader::default());
        let manager = IngestManager::start(store, config, loader, time, BackoffConfig::default(), 1);

        let contribution = manager.submit_sync(request(transaction_id, url)).await.unwrap();
        assert_eq!(contribution.status, ContributionStatus::Finished);
        assert_eq!(contribution.num_rows, 3);
    }

    #[tokio::test]
    async fn submit_sync_rejects_unstarted_transaction() {
        let mem = Arc::new(MemDatabaseServices::new());
        let store: Arc<dyn DatabaseServices> = mem.clone();
        let config = config_with("w1", "D", "Object");
        let time: Arc<dyn TimeProvider> = Arc::new(MockProvider::new(Time::from_millis(0)));
        let transaction_id = TransactionId::new(1);
        mem.begin_transaction(Transaction {
            id: transaction_id,
            database: DatabaseName::from("D"),
            state: TransactionState::IsStarting,
            begin_time: time.now(),
            end_time: None,
            context: String::new(),
        })
        .await
        .unwrap();
        let (_dir, url) = csv_file("1\t2\n");
        let loader: Arc<dyn ContributionLoader> = Arc::new(RecordingLoader::default());
        let manager = IngestManager::start(store, config, loader, time, BackoffConfig::default(), 1);

        let err = manager.submit_sync(request(transaction_id, url)).await.unwrap_err();
        assert!(matches!(err, IngestError::TransactionNotStarted { .. }));
    }

    #[tokio::test]
    async fn submit_sync_rejects_unregistered_table() {
        let mem = Arc::new(MemDatabaseServices::new());
        let store: Arc<dyn DatabaseServices> = mem.clone();
        let config = config_with("w1", "D", "SomeOtherTable");
        let time: Arc<dyn TimeProvider> = Arc::new(MockProvider::new(Time::from_millis(0)));
        let transaction_id = started_transaction(&mem, "D", time.now()).await;
        let (_dir, url) = csv_file("1\t2\n");
        let loader: Arc<dyn ContributionLoader> = Arc::new(RecordingLoader::default());
        let manager = IngestManager::start(store, config, loader, time, BackoffConfig::default(), 1);

        let err = manager.submit_sync(request(transaction_id, url)).await.unwrap_err();
        assert!(matches!(err, IngestError::TableNotRegistered { .. }));
    }

    #[tokio::test]
    async fn submit_sync_rejects_unsupported_scheme() {
        let mem = Arc::new(MemDatabaseServices::new());
        let store: Arc<dyn DatabaseServices> = mem.clone();
        let config = config_with("w1", "D", "Object");
        let time: Arc<dyn TimeProvider> = Arc::new(MockProvider::new(Time::from_millis(0)));
        let transaction_id = started_transaction(&mem, "D", time.now()).await;
        let loader: Arc<dyn ContributionLoader> = Arc::new(RecordingLoader::default());
        let manager = IngestManager::start(store, config, loader, time, BackoffConfig::default(), 1);

        let err = manager
            .submit_sync(request(transaction_id, "ftp://example.com/x.csv".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedScheme { .. }));
    }

    #[tokio::test]
    async fn submit_async_runs_on_the_worker_pool() {
        let mem = Arc::new(MemDatabaseServices::new());
        let store: Arc<dyn DatabaseServices> = mem.clone();
        let config = config_with("w1", "D", "Object");
        let time: Arc<dyn TimeProvider> = Arc::new(MockProvider::new(Time::from_millis(0)));
        let transaction_id = started_transaction(&mem, "D", time.now()).await;
        let (_dir, url) = csv_file("1\t2\n3\t4\n");
        let loader: Arc<dyn ContributionLoader> = Arc::new(RecordingLoader::default());
        let manager = IngestManager::start(store.clone(), config, loader, time, BackoffConfig::default(), 2);

        let id = manager.submit_async(request(transaction_id, url)).await.unwrap();

        let mut contribution = store.find_contribution(id).await.unwrap();
        for _ in 0..200 {
            if contribution.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            contribution = store.find_contribution(id).await.unwrap();
        }
        assert_eq!(contribution.status, ContributionStatus::Finished);
        assert_eq!(contribution.num_rows, 2);
    }

    #[derive(Debug, Default)]
    struct BlockingLoader {
        gate: Notify,
        entered: Notify,
        calls: parking_lot::Mutex<u32>,
    }

    #[async_trait]
    impl ContributionLoader for BlockingLoader {
        async fn load(
            &self,
            _worker: &Worker,
            _table: &repl_types::TableName,
            _chunk: ChunkNumber,
            _is_overlap: bool,
            _dialect: &Dialect,
            _batch: &[u8],
        ) -> Result<(), IngestError> {
            *self.calls.lock() += 1;
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancelling_a_still_queued_contribution_skips_it_entirely() {
        let mem = Arc::new(MemDatabaseServices::new());
        let store: Arc<dyn DatabaseServices> = mem.clone();
        let config = config_with("w1", "D", "Object");
        let time: Arc<dyn TimeProvider> = Arc::new(MockProvider::new(Time::from_millis(0)));
        let transaction_id = started_transaction(&mem, "D", time.now()).await;
        let (_dir_a, url_a) = csv_file("1\t2\n");
        let (_dir_b, url_b) = csv_file("3\t4\n");
        let loader = Arc::new(BlockingLoader::default());
        let loader_dyn: Arc<dyn ContributionLoader> = loader.clone();
        let manager = IngestManager::start(store.clone(), config, loader_dyn, time, BackoffConfig::default(), 1);

        // Sole worker picks this one up and blocks inside `load`.
        let first = manager.submit_async(request(transaction_id, url_a)).await.unwrap();
        loader.entered.notified().await;

        // Second contribution can only be sitting in the queue, since the
        // lone worker is still blocked on the first.
        let second = manager.submit_async(request(transaction_id, url_b)).await.unwrap();
        assert_eq!(manager.queue_len(), 1);

        manager.cancel_contribution(second).await.unwrap();
        let second_contribution = store.find_contribution(second).await.unwrap();
        assert_eq!(second_contribution.status, ContributionStatus::Cancelled);

        loader.gate.notify_one();
        let mut first_contribution = store.find_contribution(first).await.unwrap();
        for _ in 0..200 {
            if first_contribution.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            first_contribution = store.find_contribution(first).await.unwrap();
        }
        assert_eq!(first_contribution.status, ContributionStatus::Finished);
        assert_eq!(*loader.calls.lock(), 1);
    }
}

