use std::sync::Arc;

use hyper::{Body, Request, Response};
use repl_job::ReplicateJob;
use repl_types::{DatabaseName, JobExtendedState, JobState};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::body::read_json;
use crate::envelope::ok_response;
use crate::error::HttpError;
use crate::router::PathParams;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ReplicateBody {
    database: String,
    min_replicas: u32,
    #[serde(default)]
    priority: i32,
}

#[derive(Serialize)]
struct JobBody {
    id: u64,
    state: JobState,
    extended_state: JobExtendedState,
}

impl From<repl_types::JobRecord> for JobBody {
    fn from(r: repl_types::JobRecord) -> Self {
        Self { id: r.id.get(), state: r.state, extended_state: r.extended_state }
    }
}

/// `POST /replication/replicate`: representative of the Controller's
/// Job-submission surface. Bridges `submit_job`'s callback-based completion
/// into an awaitable HTTP response via a one-shot channel; the job itself
/// still runs to completion even if the client disconnects early, since
/// `on_finish` is not cancelled by dropping the receiver.
pub async fn replicate(state: Arc<AppState>, req: Request<Body>, _params: PathParams) -> Result<Response<Body>, HttpError> {
    let body: ReplicateBody = read_json(req).await?;
    let job = ReplicateJob { database: DatabaseName::from(body.database.as_str()), min_replicas: body.min_replicas };

    let (tx, rx) = oneshot::channel();
    let _handle = state.controller.submit_job(
        Box::new(job),
        None,
        body.priority,
        false,
        false,
        None,
        move |record| {
            let _ = tx.send(record);
        },
    )?;

    let record = rx.await.map_err(|_| HttpError::JobRejected { message: "job completion channel closed".to_string() })?;
    Ok(ok_response(JobBody::from(record)))
}
