use repl_types::{ChunkNumber, Dialect, TableName, TransactionId, WorkerName};

/// One table-contribution request, as accepted by
/// [`crate::IngestManager::submit_sync`]/`submit_async`.
#[derive(Debug, Clone)]
pub struct ContributionRequest {
    pub transaction_id: TransactionId,
    pub worker: WorkerName,
    pub table: TableName,
    pub chunk: ChunkNumber,
    pub is_overlap: bool,
    pub url: String,
    pub dialect: Dialect,
    /// Scheduling priority for ASYNC mode; higher runs first. Ignored in
    /// SYNC mode, which always runs on the caller's own task.
    pub priority: i32,
    pub retry_budget: u32,
}
