use async_trait::async_trait;
use repl_time::Time;
use repl_types::{
    ChunkNumber, Contribution, ContributionId, ContributionStatus, DatabaseName, ExtendedState, JobId, JobRecord,
    Replica, RequestId, RequestRecord, RequestState, Transaction, TransactionId, TransactionState, WorkerName,
};

use crate::Result;

/// A controller process's durable identity: registered once at startup and
/// consulted afterwards for provenance (which controller issued which Job).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerIdentity {
    pub id: repl_types::ControllerId,
    pub host: String,
    pub pid: u32,
    pub start_time: Time,
}

/// The durable store's full contract. Every method takes a handle for the
/// duration of one call; implementations own whatever pooling/locking is
/// required to make that call safe to run concurrently with every other
/// method on the same object.
#[async_trait]
pub trait DatabaseServices: std::fmt::Debug + Send + Sync {
    /// Idempotent registration of a controller's identity.
    async fn save_controller(&self, identity: ControllerIdentity) -> Result<()>;

    async fn save_job(&self, job: &JobRecord) -> Result<()>;
    async fn update_job_heartbeat(&self, id: JobId, at: Time) -> Result<()>;

    async fn save_request(&self, request: &RequestRecord) -> Result<()>;
    async fn update_request_state(
        &self,
        id: RequestId,
        target_request_id: Option<String>,
        state: RequestState,
        extended_state: ExtendedState,
    ) -> Result<()>;

    /// Upserts one replica row.
    async fn save_replica_info(&self, replica: Replica) -> Result<()>;

    /// Atomically replaces the set of replicas on `(worker, database)` with
    /// exactly `collection`: rows present in the store but absent from
    /// `collection` are marked deleted in the same operation.
    async fn save_replica_info_collection(
        &self,
        worker: &WorkerName,
        database: &DatabaseName,
        collection: Vec<Replica>,
    ) -> Result<()>;

    /// Ordered `(database, chunk, worker)`.
    async fn find_replicas(&self, database: &DatabaseName, chunk: Option<ChunkNumber>) -> Result<Vec<Replica>>;

    /// Exactly the replicas last written by `save_replica_info_collection`
    /// for this `(worker, database)` pair.
    async fn find_worker_replicas(&self, worker: &WorkerName, database: &DatabaseName) -> Result<Vec<Replica>>;

    async fn find_oldest_replicas(&self, database: &DatabaseName, limit: usize) -> Result<Vec<Replica>>;

    async fn begin_transaction(&self, transaction: Transaction) -> Result<()>;
    async fn update_transaction_state(&self, id: TransactionId, state: TransactionState) -> Result<()>;
    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction>;

    async fn save_contribution(&self, contribution: Contribution) -> Result<()>;
    async fn update_contribution_status(&self, id: ContributionId, status: ContributionStatus) -> Result<()>;
    async fn find_contribution(&self, id: ContributionId) -> Result<Contribution>;
    async fn find_contributions_in_transaction(&self, transaction: TransactionId) -> Result<Vec<Contribution>>;
}
