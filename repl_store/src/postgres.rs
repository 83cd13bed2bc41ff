use async_trait::async_trait;
use observability_deps::tracing::info;
use repl_time::Time;
use repl_tracker::NamedMutexRegistry;
use repl_types::{
    ChunkNumber, Contribution, ContributionId, ContributionStatus, Dialect, DatabaseName, ExtendedState, JobExtendedState,
    JobId, JobRecord, JobState, Replica, ReplicaStatus, RequestId, RequestRecord, RequestState, Transaction,
    TransactionId, TransactionState, WorkerName,
};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::{
    error::{ConnectSnafu, NotFoundSnafu},
    interface::{ControllerIdentity, DatabaseServices},
    Result, StoreError,
};

/// Maps a vendor `sqlx::Error` onto the taxonomy every other layer consumes.
/// The single point where Postgres-specific knowledge (constraint names,
/// SQLSTATE codes) is allowed to exist in this workspace.
pub fn from_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::DuplicateEntry,
            Some("23503") => StoreError::NoReferencedRow,
            _ => StoreError::Transport { source: err },
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::Transport { source: err },
        sqlx::Error::RowNotFound => StoreError::NotFound { what: "row".into() },
        _ => StoreError::Transport { source: err },
    }
}

/// A `DatabaseServices` backed by a Postgres connection pool.
///
/// `pool.acquire()` hands out a `PoolConnection<Postgres>` that is
/// exclusively owned for the duration of one call, mirroring
/// `DatabaseServicesPool`'s "handle per call" contract. Per-transaction
/// state transitions additionally take a [`NamedMutexRegistry`] lock keyed
/// by transaction id, since a transaction's row can legitimately be
/// touched by both the controller (state transitions) and the ingest
/// manager (contribution updates) concurrently.
#[derive(Debug)]
pub struct PostgresDatabaseServices {
    pool: PgPool,
    transaction_locks: NamedMutexRegistry<TransactionId>,
}

impl PostgresDatabaseServices {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|source| ConnectSnafu { source }.build())?;
        info!(max_connections, "connected to replication store");
        Ok(Self {
            pool,
            transaction_locks: NamedMutexRegistry::new(),
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            transaction_locks: NamedMutexRegistry::new(),
        }
    }
}

fn job_state_str(s: JobState) -> &'static str {
    match s {
        JobState::Created => "CREATED",
        JobState::InProgress => "IN_PROGRESS",
        JobState::Finished => "FINISHED",
    }
}

fn job_extended_state_str(s: JobExtendedState) -> &'static str {
    match s {
        JobExtendedState::None => "NONE",
        JobExtendedState::Success => "SUCCESS",
        JobExtendedState::Failed => "FAILED",
        JobExtendedState::Cancelled => "CANCELLED",
        JobExtendedState::ConfigError => "CONFIG_ERROR",
        JobExtendedState::Expired => "EXPIRED",
    }
}

fn request_state_str(s: RequestState) -> &'static str {
    match s {
        RequestState::Created => "CREATED",
        RequestState::InProgress => "IN_PROGRESS",
        RequestState::Finished => "FINISHED",
    }
}

fn extended_state_str(s: ExtendedState) -> &'static str {
    match s {
        ExtendedState::None => "NONE",
        ExtendedState::Success => "SUCCESS",
        ExtendedState::ClientError => "CLIENT_ERROR",
        ExtendedState::ServerBad => "SERVER_BAD",
        ExtendedState::ServerBadResponse => "SERVER_BAD_RESPONSE",
        ExtendedState::ServerCreated => "SERVER_CREATED",
        ExtendedState::ServerQueued => "SERVER_QUEUED",
        ExtendedState::ServerInProgress => "SERVER_IN_PROGRESS",
        ExtendedState::ServerIsCancelling => "SERVER_IS_CANCELLING",
        ExtendedState::ServerError => "SERVER_ERROR",
        ExtendedState::ServerChunkInUse => "SERVER_CHUNK_IN_USE",
        ExtendedState::ServerCancelled => "SERVER_CANCELLED",
        ExtendedState::TimeoutExpired => "TIMEOUT_EXPIRED",
        ExtendedState::Cancelled => "CANCELLED",
        ExtendedState::Expired => "EXPIRED",
    }
}

fn transaction_state_str(s: TransactionState) -> &'static str {
    match s {
        TransactionState::IsStarting => "IS_STARTING",
        TransactionState::Started => "STARTED",
        TransactionState::IsFinishing => "IS_FINISHING",
        TransactionState::Finished => "FINISHED",
        TransactionState::IsAborting => "IS_ABORTING",
        TransactionState::Aborted => "ABORTED",
        TransactionState::StartFailed => "START_FAILED",
        TransactionState::FinishFailed => "FINISH_FAILED",
        TransactionState::AbortFailed => "ABORT_FAILED",
    }
}

fn parse_transaction_state(s: &str) -> TransactionState {
    match s {
        "IS_STARTING" => TransactionState::IsStarting,
        "STARTED" => TransactionState::Started,
        "IS_FINISHING" => TransactionState::IsFinishing,
        "FINISHED" => TransactionState::Finished,
        "IS_ABORTING" => TransactionState::IsAborting,
        "ABORTED" => TransactionState::Aborted,
        "START_FAILED" => TransactionState::StartFailed,
        "FINISH_FAILED" => TransactionState::FinishFailed,
        _ => TransactionState::AbortFailed,
    }
}

fn contribution_status_str(s: ContributionStatus) -> &'static str {
    match s {
        ContributionStatus::InProgress => "IN_PROGRESS",
        ContributionStatus::Finished => "FINISHED",
        ContributionStatus::Cancelled => "CANCELLED",
        ContributionStatus::ReadFailed => "READ_FAILED",
        ContributionStatus::LoadFailed => "LOAD_FAILED",
    }
}

fn parse_contribution_status(s: &str) -> ContributionStatus {
    match s {
        "IN_PROGRESS" => ContributionStatus::InProgress,
        "FINISHED" => ContributionStatus::Finished,
        "CANCELLED" => ContributionStatus::Cancelled,
        "READ_FAILED" => ContributionStatus::ReadFailed,
        _ => ContributionStatus::LoadFailed,
    }
}

fn replica_status_str(s: ReplicaStatus) -> &'static str {
    match s {
        ReplicaStatus::NotFound => "NOT_FOUND",
        ReplicaStatus::CreateInProgress => "CREATE_IN_PROGRESS",
        ReplicaStatus::Complete => "COMPLETE",
        ReplicaStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
    }
}

fn parse_replica_status(s: &str) -> ReplicaStatus {
    match s {
        "NOT_FOUND" => ReplicaStatus::NotFound,
        "CREATE_IN_PROGRESS" => ReplicaStatus::CreateInProgress,
        "COMPLETE" => ReplicaStatus::Complete,
        _ => ReplicaStatus::DeleteInProgress,
    }
}

fn row_to_replica(row: &sqlx::postgres::PgRow) -> Result<Replica> {
    Ok(Replica {
        worker: WorkerName::from(row.try_get::<String, _>("worker").map_err(from_sqlx_error)?),
        database: DatabaseName::from(row.try_get::<String, _>("database").map_err(from_sqlx_error)?),
        chunk: ChunkNumber::new(row.try_get::<i64, _>("chunk").map_err(from_sqlx_error)? as u32),
        status: parse_replica_status(&row.try_get::<String, _>("status").map_err(from_sqlx_error)?),
        verify_time: row
            .try_get::<Option<i64>, _>("verify_time")
            .map_err(from_sqlx_error)?
            .map(Time::from_millis),
        files: vec![],
    })
}

#[async_trait]
impl DatabaseServices for PostgresDatabaseServices {
    async fn save_controller(&self, identity: ControllerIdentity) -> Result<()> {
        sqlx::query(
            "INSERT INTO controller (id, host, pid, start_time) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET host = EXCLUDED.host, pid = EXCLUDED.pid",
        )
        .bind(identity.id.get() as i64)
        .bind(&identity.host)
        .bind(identity.pid as i32)
        .bind(identity.start_time.millis())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn save_job(&self, job: &JobRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO job (id, controller_id, parent_id, state, extended_state, priority, heartbeat_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                 state = EXCLUDED.state, extended_state = EXCLUDED.extended_state,
                 heartbeat_time = EXCLUDED.heartbeat_time",
        )
        .bind(job.id.get() as i64)
        .bind(job.controller_id.get() as i64)
        .bind(job.parent_id.map(|id| id.get() as i64))
        .bind(job_state_str(job.state))
        .bind(job_extended_state_str(job.extended_state))
        .bind(job.priority)
        .bind(job.heartbeat_time.millis())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_job_heartbeat(&self, id: JobId, at: Time) -> Result<()> {
        let result = sqlx::query("UPDATE job SET heartbeat_time = $1 WHERE id = $2 AND heartbeat_time < $1")
            .bind(at.millis())
            .bind(id.get() as i64)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;
        if result.rows_affected() == 0 {
            return NotFoundSnafu { what: format!("job {id}") }.fail();
        }
        Ok(())
    }

    async fn save_request(&self, request: &RequestRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO request (id, worker, state, extended_state, database, chunk, priority, target_request_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                 state = EXCLUDED.state, extended_state = EXCLUDED.extended_state,
                 target_request_id = EXCLUDED.target_request_id",
        )
        .bind(request.id.get() as i64)
        .bind(request.worker.as_str())
        .bind(request_state_str(request.state))
        .bind(extended_state_str(request.extended_state))
        .bind(request.database.as_ref().map(|d| d.as_str().to_string()))
        .bind(request.chunk.map(|c| c.get() as i64))
        .bind(request.priority)
        .bind(&request.target_request_id)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_request_state(
        &self,
        id: RequestId,
        target_request_id: Option<String>,
        state: RequestState,
        extended_state: ExtendedState,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE request SET state = $1, extended_state = $2,
                 target_request_id = COALESCE($3, target_request_id)
             WHERE id = $4",
        )
        .bind(request_state_str(state))
        .bind(extended_state_str(extended_state))
        .bind(target_request_id)
        .bind(id.get() as i64)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        if result.rows_affected() == 0 {
            return NotFoundSnafu { what: format!("request {id}") }.fail();
        }
        Ok(())
    }

    async fn save_replica_info(&self, replica: Replica) -> Result<()> {
        sqlx::query(
            "INSERT INTO replica (worker, database, chunk, status, verify_time)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (worker, database, chunk) DO UPDATE SET
                 status = EXCLUDED.status, verify_time = EXCLUDED.verify_time",
        )
        .bind(replica.worker.as_str())
        .bind(replica.database.as_str())
        .bind(replica.chunk.get() as i64)
        .bind(replica_status_str(replica.status))
        .bind(replica.verify_time.map(|t| t.millis()))
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn save_replica_info_collection(
        &self,
        worker: &WorkerName,
        database: &DatabaseName,
        collection: Vec<Replica>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(from_sqlx_error)?;
        sqlx::query("DELETE FROM replica WHERE worker = $1 AND database = $2")
            .bind(worker.as_str())
            .bind(database.as_str())
            .execute(&mut tx)
            .await
            .map_err(from_sqlx_error)?;
        for replica in &collection {
            sqlx::query(
                "INSERT INTO replica (worker, database, chunk, status, verify_time) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(replica.worker.as_str())
            .bind(replica.database.as_str())
            .bind(replica.chunk.get() as i64)
            .bind(replica_status_str(replica.status))
            .bind(replica.verify_time.map(|t| t.millis()))
            .execute(&mut tx)
            .await
            .map_err(from_sqlx_error)?;
        }
        tx.commit().await.map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn find_replicas(&self, database: &DatabaseName, chunk: Option<ChunkNumber>) -> Result<Vec<Replica>> {
        let rows = match chunk {
            Some(c) => sqlx::query(
                "SELECT worker, database, chunk, status, verify_time FROM replica
                 WHERE database = $1 AND chunk = $2 ORDER BY database, chunk, worker",
            )
            .bind(database.as_str())
            .bind(c.get() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(from_sqlx_error)?,
            None => sqlx::query(
                "SELECT worker, database, chunk, status, verify_time FROM replica
                 WHERE database = $1 ORDER BY database, chunk, worker",
            )
            .bind(database.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(from_sqlx_error)?,
        };
        rows.iter().map(row_to_replica).collect()
    }

    async fn find_worker_replicas(&self, worker: &WorkerName, database: &DatabaseName) -> Result<Vec<Replica>> {
        let rows = sqlx::query(
            "SELECT worker, database, chunk, status, verify_time FROM replica
             WHERE worker = $1 AND database = $2 ORDER BY database, chunk, worker",
        )
        .bind(worker.as_str())
        .bind(database.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        rows.iter().map(row_to_replica).collect()
    }

    async fn find_oldest_replicas(&self, database: &DatabaseName, limit: usize) -> Result<Vec<Replica>> {
        let rows = sqlx::query(
            "SELECT worker, database, chunk, status, verify_time FROM replica
             WHERE database = $1 ORDER BY verify_time ASC NULLS FIRST LIMIT $2",
        )
        .bind(database.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        rows.iter().map(row_to_replica).collect()
    }

    async fn begin_transaction(&self, transaction: Transaction) -> Result<()> {
        let _guard = self.transaction_locks.lock(transaction.id).await;
        sqlx::query(
            "INSERT INTO transaction (id, database, state, begin_time, context) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(transaction.id.get())
        .bind(transaction.database.as_str())
        .bind(transaction_state_str(transaction.state))
        .bind(transaction.begin_time.millis())
        .bind(&transaction.context)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_transaction_state(&self, id: TransactionId, state: TransactionState) -> Result<()> {
        let _guard = self.transaction_locks.lock(id).await;
        let result = sqlx::query("UPDATE transaction SET state = $1 WHERE id = $2")
            .bind(transaction_state_str(state))
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;
        if result.rows_affected() == 0 {
            return NotFoundSnafu { what: format!("transaction {id}") }.fail();
        }
        Ok(())
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Transaction> {
        let row = sqlx::query("SELECT id, database, state, begin_time, end_time, context FROM transaction WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx_error)?
            .ok_or_else(|| NotFoundSnafu { what: format!("transaction {id}") }.build())?;
        Ok(Transaction {
            id: TransactionId::new(row.try_get("id").map_err(from_sqlx_error)?),
            database: DatabaseName::from(row.try_get::<String, _>("database").map_err(from_sqlx_error)?),
            state: parse_transaction_state(&row.try_get::<String, _>("state").map_err(from_sqlx_error)?),
            begin_time: Time::from_millis(row.try_get("begin_time").map_err(from_sqlx_error)?),
            end_time: row
                .try_get::<Option<i64>, _>("end_time")
                .map_err(from_sqlx_error)?
                .map(Time::from_millis),
            context: row.try_get("context").map_err(from_sqlx_error)?,
        })
    }

    async fn save_contribution(&self, contribution: Contribution) -> Result<()> {
        let _guard = self.transaction_locks.lock(contribution.transaction_id).await;
        sqlx::query(
            "INSERT INTO contribution
                 (id, transaction_id, worker, table_name, chunk, is_overlap, url, status, num_bytes, num_rows,
                  start_ms, read_ms, load_ms, retries)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, retries = EXCLUDED.retries",
        )
        .bind(contribution.id.get())
        .bind(contribution.transaction_id.get())
        .bind(contribution.worker.as_str())
        .bind(contribution.table.as_str())
        .bind(contribution.chunk.get() as i64)
        .bind(contribution.is_overlap)
        .bind(&contribution.url)
        .bind(contribution_status_str(contribution.status))
        .bind(contribution.num_bytes as i64)
        .bind(contribution.num_rows as i64)
        .bind(contribution.start_ms.millis())
        .bind(contribution.read_ms as i64)
        .bind(contribution.load_ms as i64)
        .bind(contribution.retries as i32)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        Ok(())
    }

    async fn update_contribution_status(&self, id: ContributionId, status: ContributionStatus) -> Result<()> {
        let result = sqlx::query("UPDATE contribution SET status = $1 WHERE id = $2")
            .bind(contribution_status_str(status))
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;
        if result.rows_affected() == 0 {
            return NotFoundSnafu { what: format!("contribution {id}") }.fail();
        }
        Ok(())
    }

    async fn find_contribution(&self, id: ContributionId) -> Result<Contribution> {
        let row = sqlx::query(
            "SELECT id, transaction_id, worker, table_name, chunk, is_overlap, url, status, num_bytes, num_rows,
                    start_ms, read_ms, load_ms, retries
             FROM contribution WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx_error)?
        .ok_or_else(|| NotFoundSnafu { what: format!("contribution {id}") }.build())?;
        row_to_contribution(&row)
    }

    async fn find_contributions_in_transaction(&self, transaction: TransactionId) -> Result<Vec<Contribution>> {
        let rows = sqlx::query(
            "SELECT id, transaction_id, worker, table_name, chunk, is_overlap, url, status, num_bytes, num_rows,
                    start_ms, read_ms, load_ms, retries
             FROM contribution WHERE transaction_id = $1",
        )
        .bind(transaction.get())
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx_error)?;
        rows.iter().map(row_to_contribution).collect()
    }
}

fn row_to_contribution(row: &sqlx::postgres::PgRow) -> Result<Contribution> {
    Ok(Contribution {
        id: ContributionId::new(row.try_get("id").map_err(from_sqlx_error)?),
        transaction_id: TransactionId::new(row.try_get("transaction_id").map_err(from_sqlx_error)?),
        worker: WorkerName::from(row.try_get::<String, _>("worker").map_err(from_sqlx_error)?),
        table: row.try_get::<String, _>("table_name").map_err(from_sqlx_error)?.into(),
        chunk: ChunkNumber::new(row.try_get::<i64, _>("chunk").map_err(from_sqlx_error)? as u32),
        is_overlap: row.try_get("is_overlap").map_err(from_sqlx_error)?,
        url: row.try_get("url").map_err(from_sqlx_error)?,
        dialect: Dialect::default(),
        status: parse_contribution_status(&row.try_get::<String, _>("status").map_err(from_sqlx_error)?),
        num_bytes: row.try_get::<i64, _>("num_bytes").map_err(from_sqlx_error)? as u64,
        num_rows: row.try_get::<i64, _>("num_rows").map_err(from_sqlx_error)? as u64,
        start_ms: Time::from_millis(row.try_get("start_ms").map_err(from_sqlx_error)?),
        read_ms: row.try_get::<i64, _>("read_ms").map_err(from_sqlx_error)? as u64,
        load_ms: row.try_get::<i64, _>("load_ms").map_err(from_sqlx_error)? as u64,
        warnings: vec![],
        retries: row.try_get::<i32, _>("retries").map_err(from_sqlx_error)? as u32,
    })
}
