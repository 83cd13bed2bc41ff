use repl_store::StoreError;
use repl_types::{TransactionId, WorkerName};
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum IngestError {
    #[snafu(display("transaction {id} is not STARTED"))]
    TransactionNotStarted { id: TransactionId },

    #[snafu(display("table '{table}' is not registered in database '{database}'"))]
    TableNotRegistered { database: String, table: String },

    #[snafu(display("worker '{worker}' is unknown or disabled"))]
    WorkerUnavailable { worker: WorkerName },

    #[snafu(display("url '{url}' could not be parsed: {message}"))]
    InvalidUrl { url: String, message: String },

    #[snafu(display("url scheme '{scheme}' is not supported"))]
    UnsupportedScheme { scheme: String },

    #[snafu(display("store error: {source}"))]
    Store { source: StoreError },

    #[snafu(display("read failed: {message}"))]
    ReadFailed { message: String },

    #[snafu(display("load failed: {message}"))]
    LoadFailed { message: String },

    #[snafu(display("contribution was cancelled"))]
    Cancelled,
}

impl From<StoreError> for IngestError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
