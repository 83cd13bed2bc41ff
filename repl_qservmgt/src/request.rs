use std::sync::Arc;

use bytes::Bytes;
use observability_deps::tracing::{debug, warn};
use repl_messenger::Messenger;
use repl_proto::{FrameKind, RequestHeader, ResponseHeader, StatusCode};
use repl_time::{Time, TimeProvider};
use repl_tracker::{CompletionSlot, Task, TaskOutcome};
use repl_types::{ChunkNumber, DatabaseName, ExtendedState, RequestState, WorkerName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kinds::QservMgtBehavior;
use crate::{QservMgtError, Result};

/// Mirrors `repl_types::RequestRecord` but for control-plane traffic to
/// the query-engine workers; not part of the store's persisted layout,
/// which only rows Request/Job/Replica/Transaction/Contribution/Message.
#[derive(Debug, Clone, PartialEq)]
pub struct QservMgtRequestRecord {
    pub request_type: crate::QservMgtRequestType,
    pub worker: WorkerName,
    pub state: RequestState,
    pub extended_state: ExtendedState,
    pub database: Option<DatabaseName>,
    pub chunk: Option<ChunkNumber>,
    pub server_error: Option<String>,
    pub response: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct QservMgtRuntime {
    pub messenger: Arc<Messenger>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub instance_id: u64,
}

#[derive(Debug, Clone)]
pub struct QservMgtRequestHandle {
    task: Task,
}

impl QservMgtRequestHandle {
    pub fn cancel(&self) {
        self.task.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }
}

#[derive(Serialize, Deserialize)]
struct JsonRequestFrame {
    header: RequestHeader,
    body: Value,
}

#[derive(Serialize, Deserialize)]
struct JsonResponseFrame {
    header: ResponseHeader,
    body: Value,
}

/// Spawns one control-plane request against a query-engine worker.
/// Cancellation is best-effort: once the send is in flight there is no
/// local way to abort it, only to stop waiting and report `Cancelled`, the
/// same best-effort contract as an SSI call racing a cancel.
pub fn spawn(
    runtime: Arc<QservMgtRuntime>,
    request_id: u64,
    worker: WorkerName,
    behavior: Box<dyn QservMgtBehavior>,
    deadline: Option<Time>,
    on_finish: impl FnOnce(QservMgtRequestRecord) + Send + 'static,
) -> QservMgtRequestHandle {
    let task = Task::new(deadline);
    let handle = QservMgtRequestHandle { task: task.clone() };
    let completion = CompletionSlot::new(on_finish);
    tokio::spawn(run(runtime, request_id, worker, behavior, task, completion));
    handle
}

async fn run(
    runtime: Arc<QservMgtRuntime>,
    request_id: u64,
    worker: WorkerName,
    behavior: Box<dyn QservMgtBehavior>,
    task: Task,
    completion: CompletionSlot<QservMgtRequestRecord>,
) {
    let mut record = QservMgtRequestRecord {
        request_type: behavior.request_type(),
        worker: worker.clone(),
        state: RequestState::InProgress,
        extended_state: ExtendedState::None,
        database: None,
        chunk: None,
        server_error: None,
        response: None,
    };

    let send_fut = send_once(&runtime, &worker, &*behavior, request_id);
    let outcome = match task.race(&runtime.time_provider, send_fut).await {
        TaskOutcome::Cancelled => (ExtendedState::Cancelled, None, None),
        TaskOutcome::Expired => (ExtendedState::Expired, None, None),
        TaskOutcome::Completed(Ok(outcome)) => (outcome.extended_state, outcome.server_error, outcome.response),
        TaskOutcome::Completed(Err(err)) => {
            warn!(%request_id, %worker, %err, "qservmgt request failed");
            (ExtendedState::ServerError, Some(err.to_string()), None)
        }
    };

    record.state = RequestState::Finished;
    record.extended_state = outcome.0;
    record.server_error = outcome.1;
    record.response = outcome.2;

    debug!(%request_id, %worker, extended_state = ?record.extended_state, "qservmgt request finished");
    completion.complete(record);
}

async fn send_once(
    runtime: &Arc<QservMgtRuntime>,
    worker: &WorkerName,
    behavior: &dyn QservMgtBehavior,
    request_id: u64,
) -> Result<crate::kinds::Outcome> {
    let frame = JsonRequestFrame {
        header: RequestHeader {
            id: request_id,
            kind: FrameKind::Request,
            management_type: None,
            instance_id: runtime.instance_id,
        },
        body: behavior.to_json(),
    };
    let encoded = serde_json::to_vec(&frame).map_err(|source| QservMgtError::Encode { source })?;

    let raw = runtime
        .messenger
        .send(worker, request_id.to_string(), Bytes::from(encoded), 0)
        .await?;
    let response: JsonResponseFrame = serde_json::from_slice(&raw).map_err(|source| QservMgtError::Decode { source })?;

    Ok(behavior.analyze_response(response.header.status, response.body))
}
