use std::sync::Arc;

use bytes::Bytes;
use observability_deps::tracing::{debug, info, warn};
use repl_backoff::BackoffConfig;
use repl_messenger::{Messenger, MessengerError};
use repl_proto::{RequestFrame, RequestHeader, ResponseBody, ResponseFrame};
use repl_store::DatabaseServices;
use repl_time::{Time, TimeProvider};
use repl_tracker::{CompletionSlot, Task, TaskOutcome};
use repl_types::{ExtendedState, RequestId, RequestRecord, RequestState, WorkerName};

use crate::duplicate::{DuplicateRegistry, Fingerprint};
use crate::kinds::RequestBehavior;
use crate::{Result, RequestError};

/// Worker transport failures considered worth retrying while
/// `keep_tracking` is set; everything else finishes the request
/// immediately, per the propagation policy: "Requests absorb retryable
/// transport failures up to a budget when keep_tracking is set;
/// non-retryable errors finish the Request immediately."
const MAX_TRACKING_RETRIES: u32 = 5;

/// Final snapshot handed to a duplicate joiner and, wrapped with identity
/// fields, to the owning `Request`'s completion callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcomeRecord {
    pub extended_state: ExtendedState,
    pub server_error: Option<String>,
    pub response: Option<ResponseBody>,
}

/// Delivered to a `Request`'s `on_finish` callback: the persisted envelope
/// plus the worker's typed response, which the store's schema has no
/// column for but callers (jobs aggregating a snapshot, CLI commands
/// printing a result) still need.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub record: RequestRecord,
    pub response: Option<ResponseBody>,
}

/// Shared dependencies every `Request` dispatches through. One instance is
/// owned by the `Controller` and handed to every `Request`/`Job` it spawns.
#[derive(Debug, Clone)]
pub struct RequestRuntime {
    pub messenger: Arc<Messenger>,
    pub store: Arc<dyn DatabaseServices>,
    pub duplicates: Arc<DuplicateRegistry>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub instance_id: u64,
}

/// A live handle to a spawned request: lets the owner cancel it without
/// needing to reach into its internals.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    task: Task,
}

impl RequestHandle {
    pub fn cancel(&self) {
        self.task.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }
}

/// Spawns one outbound worker operation and returns a handle to it.
/// `on_finish` is the request's single terminal callback: it fires exactly
/// once, with the first FINISHED observation of the request record
/// preceding the call.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    runtime: Arc<RequestRuntime>,
    id: RequestId,
    worker: WorkerName,
    priority: i32,
    keep_tracking: bool,
    allow_duplicate: bool,
    behavior: Box<dyn RequestBehavior>,
    deadline: Option<Time>,
    on_finish: impl FnOnce(RequestOutcome) + Send + 'static,
) -> RequestHandle {
    let task = Task::new(deadline);
    let handle = RequestHandle { task: task.clone() };
    let completion = CompletionSlot::new(on_finish);
    tokio::spawn(run(runtime, id, worker, priority, keep_tracking, allow_duplicate, behavior, task, completion));
    handle
}

#[allow(clippy::too_many_arguments)]
async fn run(
    runtime: Arc<RequestRuntime>,
    id: RequestId,
    worker: WorkerName,
    priority: i32,
    keep_tracking: bool,
    allow_duplicate: bool,
    behavior: Box<dyn RequestBehavior>,
    task: Task,
    completion: CompletionSlot<RequestOutcome>,
) {
    let request_type = behavior.request_type();
    let mut record = RequestRecord {
        id,
        request_type,
        worker: worker.clone(),
        state: RequestState::Created,
        extended_state: ExtendedState::None,
        database: behavior.database().cloned(),
        chunk: behavior.chunk(),
        server_error: None,
        priority,
        keep_tracking,
        allow_duplicate,
        target_request_id: None,
    };

    if let Err(err) = runtime.store.save_request(&record).await {
        warn!(request_id = %id, %err, "failed to persist request creation");
    }

    record.state = RequestState::InProgress;
    if let Err(err) = runtime
        .store
        .update_request_state(id, None, record.state, record.extended_state)
        .await
    {
        warn!(request_id = %id, %err, "failed to persist request start");
    }

    let fingerprint: Fingerprint = (request_type, record.database.clone(), record.chunk, worker.clone());
    let joined = if allow_duplicate { None } else { runtime.duplicates.join_or_register(fingerprint.clone()) };

    let outcome = match joined {
        Some(mut joiner) => match joiner.recv().await {
            Ok(outcome) => outcome,
            Err(_) => run_dispatch(&runtime, &worker, &*behavior, id, priority, keep_tracking, &task).await,
        },
        None => {
            let outcome = run_dispatch(&runtime, &worker, &*behavior, id, priority, keep_tracking, &task).await;
            if !allow_duplicate {
                runtime.duplicates.finish(&fingerprint, outcome.clone());
            }
            outcome
        }
    };

    record.state = RequestState::Finished;
    record.extended_state = outcome.extended_state;
    record.server_error = outcome.server_error;

    if let Err(err) =
        runtime.store.update_request_state(id, record.target_request_id.clone(), record.state, record.extended_state).await
    {
        warn!(request_id = %id, %err, "failed to persist request completion");
    }

    debug!(request_id = %id, extended_state = ?record.extended_state, "request finished");
    completion.complete(RequestOutcome { record, response: outcome.response });
}

/// Races the actual wire round-trip against cancellation and expiration,
/// retrying retryable transport failures up to a small budget when
/// `keep_tracking` is set.
async fn run_dispatch(
    runtime: &Arc<RequestRuntime>,
    worker: &WorkerName,
    behavior: &dyn RequestBehavior,
    id: RequestId,
    priority: i32,
    keep_tracking: bool,
    task: &Task,
) -> RequestOutcomeRecord {
    let attempts = if keep_tracking { MAX_TRACKING_RETRIES } else { 1 };
    let backoff_config = BackoffConfig::default();

    for attempt in 0..attempts {
        let send_fut = send_once(runtime, worker, behavior, id, priority);
        match task.race(&runtime.time_provider, send_fut).await {
            TaskOutcome::Cancelled => {
                return RequestOutcomeRecord {
                    extended_state: ExtendedState::Cancelled,
                    server_error: None,
                    response: None,
                }
            }
            TaskOutcome::Expired => {
                return RequestOutcomeRecord {
                    extended_state: ExtendedState::Expired,
                    server_error: None,
                    response: None,
                }
            }
            TaskOutcome::Completed(Ok(outcome)) => return outcome,
            TaskOutcome::Completed(Err(err)) if is_retryable(&err) && attempt + 1 < attempts => {
                let wait = backoff_config
                    .init_backoff
                    .mul_f64(backoff_config.base.powi(attempt as i32))
                    .min(backoff_config.max_backoff);
                info!(request_id = %id, %worker, attempt, ?wait, %err, "retrying request after transport error");
                tokio::time::sleep(wait).await;
                continue;
            }
            TaskOutcome::Completed(Err(err)) => {
                return RequestOutcomeRecord {
                    extended_state: ExtendedState::ServerError,
                    server_error: Some(err.to_string()),
                    response: None,
                }
            }
        }
    }
    unreachable!("loop always returns before exhausting attempts")
}

fn is_retryable(err: &RequestError) -> bool {
    matches!(err, RequestError::Messenger { source: MessengerError::ChannelClosed | MessengerError::Transport { .. } })
}

async fn send_once(
    runtime: &Arc<RequestRuntime>,
    worker: &WorkerName,
    behavior: &dyn RequestBehavior,
    id: RequestId,
    priority: i32,
) -> Result<RequestOutcomeRecord> {
    let frame: RequestFrame = (
        RequestHeader {
            id: id.get(),
            kind: repl_proto::FrameKind::Request,
            management_type: None,
            instance_id: runtime.instance_id,
        },
        behavior.to_wire(),
    );
    let encoded = bincode::serialize(&frame).map_err(|source| RequestError::Encode { source })?;

    let raw = runtime.messenger.send(worker, id.to_string(), Bytes::from(encoded), priority).await?;
    let (response_header, response_body): ResponseFrame =
        bincode::deserialize(&raw).map_err(|source| RequestError::Decode { source })?;

    let outcome = behavior.analyze_response(response_header.status, Some(response_body));
    Ok(RequestOutcomeRecord {
        extended_state: outcome.extended_state,
        server_error: outcome.server_error,
        response: outcome.response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use repl_store::MemDatabaseServices;
    use repl_time::MockProvider;
    use repl_types::ChunkNumber;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    use crate::kinds::EchoBehavior;

    #[derive(Debug)]
    struct EchoTransport;

    #[async_trait]
    impl repl_messenger::Transport for EchoTransport {
        async fn send(&self, _worker: &WorkerName, body: Bytes) -> Result<Bytes, MessengerError> {
            let (header, req_body): RequestFrame = bincode::deserialize(&body).unwrap();
            let response_body = match req_body {
                repl_proto::RequestBody::Echo { payload, .. } => repl_proto::ResponseBody::Echo { payload },
                _ => repl_proto::ResponseBody::Empty,
            };
            let response: ResponseFrame = (
                repl_proto::ResponseHeader {
                    id: header.id,
                    status: repl_proto::StatusCode::Success,
                    extended_status: None,
                },
                response_body,
            );
            Ok(Bytes::from(bincode::serialize(&response).unwrap()))
        }

        async fn send_stop(&self, _worker: &WorkerName, _target_request_id: &str) -> Result<(), MessengerError> {
            Ok(())
        }
    }

    fn runtime() -> Arc<RequestRuntime> {
        Arc::new(RequestRuntime {
            messenger: Arc::new(Messenger::new(Arc::new(EchoTransport))),
            store: Arc::new(MemDatabaseServices::new()),
            duplicates: Arc::new(DuplicateRegistry::new()),
            time_provider: Arc::new(MockProvider::new(Time::from_millis(0))),
            instance_id: 1,
        })
    }

    #[tokio::test]
    async fn echo_request_finishes_success_exactly_once() {
        let runtime = runtime();
        let (tx, rx) = oneshot::channel();
        let fired = Arc::new(StdMutex::new(0u32));
        let fired2 = fired.clone();

        spawn(
            runtime,
            RequestId::new(1),
            WorkerName::new("w1"),
            0,
            false,
            true,
            Box::new(EchoBehavior { payload: "ping".into(), delay_ms: 0 }),
            None,
            move |outcome| {
                *fired2.lock().unwrap() += 1;
                let _ = tx.send(outcome);
            },
        );

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.record.state, RequestState::Finished);
        assert_eq!(outcome.record.extended_state, ExtendedState::Success);
        assert_eq!(outcome.response, Some(repl_proto::ResponseBody::Echo { payload: "ping".into() }));
        assert_eq!(*fired.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_yields_cancelled_state() {
        let runtime = runtime();
        let (tx, rx) = oneshot::channel();

        let handle = spawn(
            runtime,
            RequestId::new(2),
            WorkerName::new("w1"),
            0,
            false,
            true,
            Box::new(EchoBehavior { payload: "ping".into(), delay_ms: 0 }),
            None,
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );
        handle.cancel();

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.record.state, RequestState::Finished);
        assert_eq!(outcome.record.extended_state, ExtendedState::Cancelled);
    }

    #[tokio::test]
    async fn duplicate_requests_join_a_single_worker_operation() {
        let runtime = runtime();
        let chunk = ChunkNumber::new(7);
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();

        spawn(
            runtime.clone(),
            RequestId::new(10),
            WorkerName::new("w1"),
            0,
            false,
            false,
            Box::new(crate::kinds::FindReplicaBehavior { database: "D".into(), chunk }),
            None,
            move |outcome| {
                let _ = tx1.send(outcome);
            },
        );
        spawn(
            runtime,
            RequestId::new(11),
            WorkerName::new("w1"),
            0,
            false,
            false,
            Box::new(crate::kinds::FindReplicaBehavior { database: "D".into(), chunk }),
            None,
            move |outcome| {
                let _ = tx2.send(outcome);
            },
        );

        let (r1, r2) = tokio::join!(rx1, rx2);
        let r1 = r1.unwrap();
        let r2 = r2.unwrap();
        assert_eq!(r1.record.extended_state, ExtendedState::Success);
        assert_eq!(r2.record.extended_state, ExtendedState::Success);
    }
}
