use std::sync::Arc;

use hyper::{Body, Request, Response};
use repl_ingest::ContributionRequest;
use repl_types::{ChunkNumber, Dialect, TableName, TransactionId, WorkerName};
use serde::{Deserialize, Serialize};

use crate::body::read_json;
use crate::envelope::{ok_empty_response, ok_response};
use crate::error::{BadRequestSnafu, HttpError};
use crate::router::PathParams;
use crate::state::AppState;
use snafu::OptionExt;

/// Wire shape of the request body for both `/ingest/file` and
/// `/ingest/file-async`: plain/primitive fields that get validated into
/// [`ContributionRequest`]'s domain newtypes before reaching the manager.
#[derive(Debug, Default, Deserialize)]
pub struct FileIngestBody {
    transaction_id: i32,
    worker: String,
    table: String,
    chunk: u32,
    #[serde(default)]
    is_overlap: bool,
    url: String,
    #[serde(default)]
    dialect: Dialect,
    #[serde(default)]
    priority: i32,
    #[serde(default = "default_retry_budget")]
    retry_budget: u32,
}

fn default_retry_budget() -> u32 {
    0
}

impl FileIngestBody {
    fn into_request(self) -> ContributionRequest {
        ContributionRequest {
            transaction_id: TransactionId::new(self.transaction_id),
            worker: WorkerName::from(self.worker.as_str()),
            table: TableName::new(self.table),
            chunk: ChunkNumber::new(self.chunk),
            is_overlap: self.is_overlap,
            url: self.url,
            dialect: self.dialect,
            priority: self.priority,
            retry_budget: self.retry_budget,
        }
    }
}

#[derive(Serialize)]
struct ContributionBody {
    id: i64,
    status: repl_types::ContributionStatus,
    num_rows: u64,
    num_bytes: u64,
    warnings: Vec<String>,
}

impl From<repl_types::Contribution> for ContributionBody {
    fn from(c: repl_types::Contribution) -> Self {
        Self { id: c.id.get(), status: c.status, num_rows: c.num_rows, num_bytes: c.num_bytes, warnings: c.warnings }
    }
}

/// `POST /ingest/file`: runs the pipeline inline and returns the
/// contribution in whatever terminal status it reached.
pub async fn ingest_file_sync(state: Arc<AppState>, req: Request<Body>, _params: PathParams) -> Result<Response<Body>, HttpError> {
    let body: FileIngestBody = read_json(req).await?;
    let contribution = state.ingest.submit_sync(body.into_request()).await?;
    Ok(ok_response(ContributionBody::from(contribution)))
}

#[derive(Serialize)]
struct AsyncIdBody {
    id: i64,
}

/// `POST /ingest/file-async`: enqueues and returns the assigned id.
pub async fn ingest_file_async(state: Arc<AppState>, req: Request<Body>, _params: PathParams) -> Result<Response<Body>, HttpError> {
    let body: FileIngestBody = read_json(req).await?;
    let id = state.ingest.submit_async(body.into_request()).await?;
    Ok(ok_response(AsyncIdBody { id: id.get() }))
}

fn contribution_id_param(params: &PathParams) -> Result<repl_types::ContributionId, HttpError> {
    let raw = params.get("id").context(BadRequestSnafu { message: "missing :id".to_string() })?;
    raw.parse::<i64>().map(repl_types::ContributionId::new).map_err(|_| HttpError::BadRequest { message: format!("invalid contribution id: {raw}") })
}

/// `GET /ingest/file-async/:id`: current status of one contribution.
pub async fn get_contribution(state: Arc<AppState>, _req: Request<Body>, params: PathParams) -> Result<Response<Body>, HttpError> {
    let id = contribution_id_param(&params)?;
    let contribution = state.store.find_contribution(id).await?;
    Ok(ok_response(ContributionBody::from(contribution)))
}

/// `DELETE /ingest/file-async/:id`: cancels one contribution.
pub async fn cancel_contribution(state: Arc<AppState>, _req: Request<Body>, params: PathParams) -> Result<Response<Body>, HttpError> {
    let id = contribution_id_param(&params)?;
    state.ingest.cancel_contribution(id).await?;
    Ok(ok_empty_response())
}

fn transaction_id_param(params: &PathParams) -> Result<TransactionId, HttpError> {
    let raw = params.get("id").context(BadRequestSnafu { message: "missing :id".to_string() })?;
    raw.parse::<i32>().map(TransactionId::new).map_err(|_| HttpError::BadRequest { message: format!("invalid transaction id: {raw}") })
}

#[derive(Serialize)]
struct ContributionsBody {
    contributions: Vec<ContributionBody>,
}

/// `GET /ingest/file-async/trans/:id`: every contribution under a
/// transaction.
pub async fn list_transaction_contributions(
    state: Arc<AppState>,
    _req: Request<Body>,
    params: PathParams,
) -> Result<Response<Body>, HttpError> {
    let id = transaction_id_param(&params)?;
    let contributions = state.store.find_contributions_in_transaction(id).await?;
    let contributions = contributions.into_iter().map(ContributionBody::from).collect();
    Ok(ok_response(ContributionsBody { contributions }))
}

/// `DELETE /ingest/file-async/trans/:id`: cancels every non-terminal
/// contribution under a transaction.
pub async fn cancel_transaction_contributions(
    state: Arc<AppState>,
    _req: Request<Body>,
    params: PathParams,
) -> Result<Response<Body>, HttpError> {
    let id = transaction_id_param(&params)?;
    state.ingest.cancel_transaction(id).await?;
    Ok(ok_empty_response())
}
