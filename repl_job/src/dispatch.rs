use std::sync::Arc;

use futures::FutureExt;
use repl_proto::ResponseBody;
use repl_qservmgt::QservMgtBehavior;
use repl_request::RequestBehavior;
use repl_time::Time;
use repl_types::{RequestId, WorkerName};
use tokio::sync::oneshot;

use crate::behavior::{ChildHandle, ChildOutcome, ChildPayload, JobRuntime};

fn request_payload(response: Option<ResponseBody>) -> Option<ChildPayload> {
    match response {
        Some(ResponseBody::Replica(r)) => Some(ChildPayload::Replica(r)),
        Some(ResponseBody::Replicas(rs)) => Some(ChildPayload::Replicas(rs)),
        _ => None,
    }
}

/// Dispatches one `Request` as a job child. `allow_duplicate` is almost
/// always `false` here: a job fanning out the same kind of work to many
/// chunks wants the duplicate registry to collapse accidental repeats
/// (e.g. two chunks on the same worker resolving to the same fingerprint).
#[allow(clippy::too_many_arguments)]
pub fn dispatch_request(
    runtime: &JobRuntime,
    worker: WorkerName,
    priority: i32,
    keep_tracking: bool,
    allow_duplicate: bool,
    behavior: Box<dyn RequestBehavior>,
    deadline: Option<Time>,
) -> ChildHandle {
    let id = RequestId::new(runtime.request_ids.next());
    let (tx, rx) = oneshot::channel();
    let label = worker.to_string();
    let handle = repl_request::spawn(
        Arc::clone(&runtime.request_runtime),
        id,
        worker,
        priority,
        keep_tracking,
        allow_duplicate,
        behavior,
        deadline,
        move |outcome| {
            let _ = tx.send(outcome);
        },
    );
    let cancel_handle = handle.clone();
    let cancel: Arc<dyn Fn() + Send + Sync> = Arc::new(move || cancel_handle.cancel());
    let result = async move {
        match rx.await {
            Ok(outcome) => ChildOutcome {
                label,
                success: outcome.record.extended_state.is_success(),
                error: outcome.record.server_error,
                payload: request_payload(outcome.response),
            },
            Err(_) => ChildOutcome {
                label,
                success: false,
                error: Some("request task dropped before completion".into()),
                payload: None,
            },
        }
    }
    .boxed();
    ChildHandle { cancel, result }
}

/// Dispatches one `QservMgtRequest` as a job child, same shape as
/// [`dispatch_request`] but over the query-engine transport.
pub fn dispatch_qservmgt(
    runtime: &JobRuntime,
    worker: WorkerName,
    behavior: Box<dyn QservMgtBehavior>,
    deadline: Option<Time>,
) -> ChildHandle {
    let id = runtime.request_ids.next();
    let (tx, rx) = oneshot::channel();
    let label = worker.to_string();
    let handle = repl_qservmgt::spawn(Arc::clone(&runtime.qservmgt_runtime), id, worker, behavior, deadline, move |record| {
        let _ = tx.send(record);
    });
    let cancel_handle = handle.clone();
    let cancel: Arc<dyn Fn() + Send + Sync> = Arc::new(move || cancel_handle.cancel());
    let result = async move {
        match rx.await {
            Ok(record) => ChildOutcome {
                label,
                success: record.extended_state.is_success(),
                error: record.server_error,
                payload: record.response.map(ChildPayload::Json),
            },
            Err(_) => ChildOutcome {
                label,
                success: false,
                error: Some("qservmgt task dropped before completion".into()),
                payload: None,
            },
        }
    }
    .boxed();
    ChildHandle { cancel, result }
}
