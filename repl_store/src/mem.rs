use std::collections::HashMap;

use async_trait::async_trait;
use observability_deps::tracing::debug;
use parking_lot::Mutex;
use repl_time::Time;
use repl_tracker::NamedMutexRegistry;
use repl_types::{
    ChunkNumber, Contribution, ContributionId, ContributionStatus, DatabaseName, ExtendedState, JobId, JobRecord,
    Replica, RequestId, RequestRecord, RequestState, Transaction, TransactionId, TransactionState, WorkerName,
};

use crate::{
    error::{NotFoundSnafu, Result},
    interface::{ControllerIdentity, DatabaseServices},
};

#[derive(Debug, Default)]
struct State {
    controller: Option<ControllerIdentity>,
    jobs: HashMap<JobId, JobRecord>,
    requests: HashMap<RequestId, RequestRecord>,
    replicas: HashMap<(WorkerName, DatabaseName), Vec<Replica>>,
    transactions: HashMap<TransactionId, Transaction>,
    contributions: HashMap<ContributionId, Contribution>,
}

/// An in-memory [`DatabaseServices`], used by tests and by `repl_cli`'s
/// local dev mode. Carries the same per-transaction serialization
/// discipline as the Postgres-backed implementation so tests exercise real
/// lock contention rather than relying on single-threaded luck.
#[derive(Debug)]
pub struct MemDatabaseServices {
    state: Mutex<State>,
    transaction_locks: NamedMutexRegistry<TransactionId>,
}

impl MemDatabaseServices {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            transaction_locks: NamedMutexRegistry::new(),
        }
    }
}

impl Default for MemDatabaseServices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseServices for MemDatabaseServices {
    async fn save_controller(&self, identity: ControllerIdentity) -> Result<()> {
        self.state.lock().controller = Some(identity);
        Ok(())
    }

    async fn save_job(&self, job: &JobRecord) -> Result<()> {
        self.state.lock().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_job_heartbeat(&self, id: JobId, at: Time) -> Result<()> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| NotFoundSnafu { what: format!("job {id}") }.build())?;
        job.heartbeat_time = at;
        Ok(())
    }

    async fn save_request(&self, request: &RequestRecord) -> Result<()> {
        self.state.lock().requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_request_state(
        &self,
        id: RequestId,
        target_request_id: Option<String>,
        state: RequestState,
        extended_state: ExtendedState,
    ) -> Result<()> {
        let mut guard = self.state.lock();
        let request = guard
            .requests
            .get_mut(&id)
            .ok_or_else(|| NotFoundSnafu { what: format!("request {id}") }.build())?;
        request.state = state;
        request.extended_state = extended_state;
        if target_request_id.is_some() {
            request.target_request_id = target_request_id;
        }
        Ok(())
    }

    async fn save_replica_info(&self, replica: Replica) -> Result<()> {
        let key = (replica.worker.clone(), replica.database.clone());
        let mut state = self.state.lock();
        let entries = state.replicas.entry(key).or_default();
        if let Some(existing) = entries.iter_mut().find(|r| r.chunk == replica.chunk) {
            *existing = replica;
        } else {
            entries.push(replica);
        }
        Ok(())
    }

    async fn save_replica_info_collection(
        &self,
        worker: &WorkerName,
        database: &DatabaseName,
        collection: Vec<Replica>,
    ) -> Result<()> {
        let key = (worker.clone(), database.clone());
        let count = collection.len();
        self.state.lock().replicas.insert(key, collection);
        debug!(%worker, %database, count, "replica collection replaced");
        Ok(())
    }

    async fn find_replicas(&self, database: &DatabaseName, chunk: Option<ChunkNumber>) -> Result<Vec<Replica>> {
        let state = self.state.lock();
        let mut out: Vec<Replica> = state
            .replicas
            .values()
            .flatten()
            .filter(|r| &r.database == database && chunk.map_or(true, |c| r.chunk == c))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(out)
    }

    async fn find_worker_replicas(&self, worker: &WorkerName, database: &DatabaseName) -> Result<Vec<Replica>> {
        let state = self.state.lock();
        let mut out = state
            .replicas
            .get(&(worker.clone(), database.clone()))
            .cloned()
            .unwrap_or_default();
        out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(out)
    }

    async fn find_oldest_replicas(&self, database: &DatabaseName, limit: usize) -> Result<Vec<Replica>> {
        let state = self.state.lock();
        let mut out: Vec<Replica> = state
            .replicas
            .values()
            .flatten()
            .filter(|r| &r.database == database)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.verify_time);
        out.truncate(limit);
        Ok(out)
    }

    async fn begin_transaction(&self, transaction: Transaction) -> Result<()> {
        let _guard = self.transaction_locks.lock(transaction.id).await;
        self.state.lock().transactions.insert(transaction.id, transaction);
        Ok(())
    }

    async fn update_transaction_state(&self, id: TransactionId, state: TransactionState) -> Result<()> {
        let _guard = self.transaction_locks.lock(id).await;
        let mut guard = self.state.lock();
        let transaction = guard
            .transactions
            .get_mut(&id)
            .ok_or_else(|| NotFoundSnafu { what: format!("transaction {id}") }.build())?;
        transaction.state = state;
        Ok(())
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.state
            .lock()
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| NotFoundSnafu { what: format!("transaction {id}") }.build())
    }

    async fn save_contribution(&self, contribution: Contribution) -> Result<()> {
        let _guard = self.transaction_locks.lock(contribution.transaction_id).await;
        self.state.lock().contributions.insert(contribution.id, contribution);
        Ok(())
    }

    async fn update_contribution_status(&self, id: ContributionId, status: ContributionStatus) -> Result<()> {
        let mut guard = self.state.lock();
        let contribution = guard
            .contributions
            .get_mut(&id)
            .ok_or_else(|| NotFoundSnafu { what: format!("contribution {id}") }.build())?;
        contribution
            .transition_to(status)
            .map_err(|e| crate::error::InvalidTransitionSnafu { message: e.to_string() }.build())?;
        Ok(())
    }

    async fn find_contribution(&self, id: ContributionId) -> Result<Contribution> {
        self.state
            .lock()
            .contributions
            .get(&id)
            .cloned()
            .ok_or_else(|| NotFoundSnafu { what: format!("contribution {id}") }.build())
    }

    async fn find_contributions_in_transaction(&self, transaction: TransactionId) -> Result<Vec<Contribution>> {
        Ok(self
            .state
            .lock()
            .contributions
            .values()
            .filter(|c| c.transaction_id == transaction)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use repl_types::{ChunkNumber, ReplicaStatus};

    use super::*;

    fn replica(worker: &str, chunk: u32, status: ReplicaStatus) -> Replica {
        Replica {
            worker: worker.into(),
            database: "D".into(),
            chunk: ChunkNumber::new(chunk),
            status,
            verify_time: None,
            files: vec![],
        }
    }

    #[tokio::test]
    async fn replica_collection_replace_is_atomic() {
        let store = MemDatabaseServices::new();
        store
            .save_replica_info_collection(
                &"w1".into(),
                &"D".into(),
                vec![
                    replica("w1", 1, ReplicaStatus::Complete),
                    replica("w1", 2, ReplicaStatus::Complete),
                ],
            )
            .await
            .unwrap();
        store
            .save_replica_info_collection(&"w1".into(), &"D".into(), vec![replica("w1", 2, ReplicaStatus::Complete)])
            .await
            .unwrap();
        let found = store.find_worker_replicas(&"w1".into(), &"D".into()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].chunk, ChunkNumber::new(2));
    }

    #[tokio::test]
    async fn contribution_terminal_monotonicity_enforced() {
        let store = MemDatabaseServices::new();
        let c = Contribution {
            id: ContributionId::new(1),
            transaction_id: TransactionId::new(1),
            worker: "w1".into(),
            table: "Object".into(),
            chunk: ChunkNumber::new(1),
            is_overlap: false,
            url: "file:///tmp/x".into(),
            dialect: repl_types::Dialect::default(),
            status: ContributionStatus::Finished,
            num_bytes: 0,
            num_rows: 0,
            start_ms: Time::from_millis(0),
            read_ms: 0,
            load_ms: 0,
            warnings: vec![],
            retries: 0,
        };
        store.save_contribution(c).await.unwrap();
        let err = store
            .update_contribution_status(ContributionId::new(1), ContributionStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_job_heartbeat_is_not_found() {
        let store = MemDatabaseServices::new();
        let err = store
            .update_job_heartbeat(JobId::new(1), Time::from_millis(0))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::StoreError::NotFound { .. }));
    }
}
