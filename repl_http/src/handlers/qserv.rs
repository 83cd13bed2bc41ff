use std::sync::Arc;

use hyper::{Body, Request, Response};
use repl_types::{ChunkNumber, DatabaseName, WorkerName};
use serde::Serialize;

use crate::body::query_param;
use crate::envelope::ok_response;
use crate::error::HttpError;
use crate::router::PathParams;
use crate::state::AppState;

#[derive(Serialize)]
struct ReplicaBody {
    worker: String,
    database: String,
    chunk: u32,
    status: repl_types::ReplicaStatus,
}

impl From<repl_types::Replica> for ReplicaBody {
    fn from(r: repl_types::Replica) -> Self {
        Self { worker: r.worker.to_string(), database: r.database.to_string(), chunk: r.chunk.get(), status: r.status }
    }
}

#[derive(Serialize)]
struct ReplicasBody {
    replicas: Vec<ReplicaBody>,
}

/// `GET /replicas/:database?chunk=N`: every replica of `database`, or of
/// one chunk of it when `chunk` is given.
pub async fn find_replicas(state: Arc<AppState>, req: Request<Body>, params: PathParams) -> Result<Response<Body>, HttpError> {
    let database = params.get("database").ok_or(HttpError::BadRequest { message: "missing :database".to_string() })?;
    let chunk = query_param(req.uri().query(), "chunk")
        .map(|v| v.parse::<u32>().map(ChunkNumber::new))
        .transpose()
        .map_err(|_| HttpError::BadRequest { message: "invalid chunk".to_string() })?;

    let replicas = state.store.find_replicas(&DatabaseName::from(database.as_str()), chunk).await?;
    let replicas = replicas.into_iter().map(ReplicaBody::from).collect();
    Ok(ok_response(ReplicasBody { replicas }))
}

/// `GET /workers/:worker/replicas/:database`: the replica set exactly as
/// last reported by that worker's own `FindAllReplicas` response.
pub async fn find_worker_replicas(state: Arc<AppState>, _req: Request<Body>, params: PathParams) -> Result<Response<Body>, HttpError> {
    let worker = params.get("worker").ok_or(HttpError::BadRequest { message: "missing :worker".to_string() })?;
    let database = params.get("database").ok_or(HttpError::BadRequest { message: "missing :database".to_string() })?;

    let replicas = state
        .store
        .find_worker_replicas(&WorkerName::from(worker.as_str()), &DatabaseName::from(database.as_str()))
        .await?;
    let replicas = replicas.into_iter().map(ReplicaBody::from).collect();
    Ok(ok_response(ReplicasBody { replicas }))
}
