use std::sync::Arc;

use futures::future::join_all;
use observability_deps::tracing::{debug, warn};
use repl_time::Time;
use repl_tracker::{CompletionSlot, Task};
use repl_types::{ControllerId, JobExtendedState, JobId, JobRecord, JobState};

use crate::behavior::{ChildOutcome, JobBehavior, JobRuntime};

/// A live handle to a spawned job: cancellation here fans out to every
/// still-running child.
#[derive(Debug, Clone)]
pub struct JobHandle {
    task: Task,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.task.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }
}

/// Spawns a fan-out job. `on_finish` is the job's single terminal
/// callback: it fires exactly once, after the job's `FINISHED` state has
/// been persisted. Admission (exclusive/preemptive enforcement) happens
/// before this is called; the job itself only fans out and joins.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    runtime: Arc<JobRuntime>,
    id: JobId,
    controller_id: ControllerId,
    parent_id: Option<JobId>,
    priority: i32,
    exclusive: bool,
    preemptive: bool,
    behavior: Box<dyn JobBehavior>,
    deadline: Option<Time>,
    on_finish: impl FnOnce(JobRecord) + Send + 'static,
) -> JobHandle {
    let task = Task::new(deadline);
    let handle = JobHandle { task: task.clone() };
    let completion = CompletionSlot::new(on_finish);
    tokio::spawn(run(runtime, id, controller_id, parent_id, priority, exclusive, preemptive, behavior, task, completion));
    handle
}

#[allow(clippy::too_many_arguments)]
async fn run(
    runtime: Arc<JobRuntime>,
    id: JobId,
    controller_id: ControllerId,
    parent_id: Option<JobId>,
    priority: i32,
    exclusive: bool,
    preemptive: bool,
    behavior: Box<dyn JobBehavior>,
    task: Task,
    completion: CompletionSlot<JobRecord>,
) {
    let time_provider = Arc::clone(&runtime.request_runtime.time_provider);
    let now = time_provider.now();
    let mut record = JobRecord {
        id,
        job_type: behavior.job_type(),
        parent_id,
        controller_id,
        state: JobState::Created,
        extended_state: JobExtendedState::None,
        priority,
        exclusive,
        preemptive,
        begin_time: Some(now),
        end_time: None,
        heartbeat_time: now,
    };
    if let Err(err) = runtime.store.save_job(&record).await {
        warn!(job_id = %id, %err, "failed to persist job creation");
    }

    let children = behavior.spawn_children(&runtime).await;
    if children.is_empty() {
        finish(&runtime, &mut record, JobExtendedState::Success, &[], &*behavior, &completion).await;
        return;
    }

    record.state = JobState::InProgress;
    record.heartbeat_time = time_provider.now();
    if let Err(err) = runtime.store.save_job(&record).await {
        warn!(job_id = %id, %err, "failed to persist job start");
    }

    let cancels: Vec<_> = children.iter().map(|c| Arc::clone(&c.cancel)).collect();
    let join_fut = join_all(children.into_iter().map(|c| c.result));
    tokio::pin!(join_fut);
    let cancel_token = task.cancellation_token();
    let cancelled = cancel_token.cancelled();
    tokio::pin!(cancelled);

    // Child Requests/QservMgtRequests carry their own deadlines; racing the
    // join here against the job's own deadline/cancellation lets us fan
    // cancellation out to every child still in flight, then keep awaiting
    // the same join future so their real terminal outcomes still land in
    // `persistent_log_data()` instead of being thrown away.
    let raced = match task.deadline() {
        None => tokio::select! {
            biased;
            _ = &mut cancelled => None,
            results = &mut join_fut => Some(results),
        },
        Some(deadline) => {
            let sleep = time_provider.sleep_until(deadline);
            tokio::pin!(sleep);
            tokio::select! {
                biased;
                _ = &mut cancelled => None,
                _ = &mut sleep => None,
                results = &mut join_fut => Some(results),
            }
        }
    };

    let (extended_state, results) = match raced {
        Some(results) => {
            let all_succeeded = behavior.finalize(&results);
            let extended_state = if all_succeeded { JobExtendedState::Success } else { JobExtendedState::Failed };
            (extended_state, results)
        }
        None => {
            for cancel in &cancels {
                cancel();
            }
            let results = join_fut.await;
            let extended_state = if cancel_token.is_cancelled() {
                JobExtendedState::Cancelled
            } else {
                JobExtendedState::Expired
            };
            (extended_state, results)
        }
    };
    finish(&runtime, &mut record, extended_state, &results, &*behavior, &completion).await;
}

/// Persists the final state and fires the one-shot completion callback.
/// `persistentLogData()` rows are logged rather than stored: the store's
/// schema has no table for them yet (see the Job diagnostics log entry in
/// the design ledger).
async fn finish(
    runtime: &Arc<JobRuntime>,
    record: &mut JobRecord,
    extended_state: JobExtendedState,
    children: &[ChildOutcome],
    behavior: &dyn JobBehavior,
    completion: &CompletionSlot<JobRecord>,
) {
    record.state = JobState::Finished;
    record.extended_state = extended_state;
    record.end_time = Some(runtime.request_runtime.time_provider.now());
    record.heartbeat_time = record.end_time.unwrap();

    if let Err(err) = runtime.store.save_job(record).await {
        warn!(job_id = %record.id, %err, "failed to persist job completion");
    }
    let failed = children.iter().filter(|c| !c.success).count();
    let log_data = behavior.persistent_log_data(children);
    debug!(job_id = %record.id, extended_state = ?record.extended_state, failed, ?log_data, "job finished");
    completion.complete(record.clone());
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::FutureExt;
    use repl_config::Configuration;
    use repl_messenger::{Messenger, MessengerError, Transport};
    use repl_qservmgt::QservMgtRuntime;
    use repl_request::RequestRuntime;
    use repl_store::MemDatabaseServices;
    use repl_time::{MockProvider, Time};
    use repl_tracker::IdGenerator;
    use repl_types::{ControllerId, JobId, WorkerName};
    use tokio::sync::oneshot;

    use super::*;
    use crate::behavior::ChildHandle;

    #[derive(Debug)]
    struct DeadTransport;

    #[async_trait]
    impl Transport for DeadTransport {
        async fn send(&self, _worker: &WorkerName, _body: bytes::Bytes) -> Result<bytes::Bytes, MessengerError> {
            Err(MessengerError::ChannelClosed)
        }

        async fn send_stop(&self, _worker: &WorkerName, _target_request_id: &str) -> Result<(), MessengerError> {
            Ok(())
        }
    }

    fn runtime() -> Arc<JobRuntime> {
        let messenger = Arc::new(Messenger::new(Arc::new(DeadTransport)));
        let time_provider = Arc::new(MockProvider::new(Time::from_millis(0)));
        Arc::new(JobRuntime {
            request_runtime: Arc::new(RequestRuntime {
                messenger: messenger.clone(),
                store: Arc::new(MemDatabaseServices::new()),
                duplicates: Arc::new(repl_request::DuplicateRegistry::new()),
                time_provider: time_provider.clone(),
                instance_id: 1,
            }),
            qservmgt_runtime: Arc::new(QservMgtRuntime { messenger, time_provider, instance_id: 1 }),
            store: Arc::new(MemDatabaseServices::new()),
            config: Arc::new(Configuration::new()),
            request_ids: Arc::new(IdGenerator::starting_at(1)),
        })
    }

    /// A job with no targets: finishes immediately without a child fan-out.
    #[derive(Debug)]
    struct NoopJob;

    #[async_trait]
    impl JobBehavior for NoopJob {
        fn job_type(&self) -> JobType {
            JobType::Sql
        }

        async fn spawn_children(&self, _runtime: &JobRuntime) -> Vec<ChildHandle> {
            Vec::new()
        }
    }

    /// A job with a fixed set of children whose outcome is baked in, so
    /// tests don't need a real worker transport.
    #[derive(Debug)]
    struct FixedJob {
        outcomes: Vec<(bool, bool)>, // (success, cancellable)
    }

    #[async_trait]
    impl JobBehavior for FixedJob {
        fn job_type(&self) -> JobType {
            JobType::Sql
        }

        async fn spawn_children(&self, _runtime: &JobRuntime) -> Vec<ChildHandle> {
            self.outcomes
                .iter()
                .enumerate()
                .map(|(i, &(success, cancellable))| {
                    let notify = Arc::new(tokio::sync::Notify::new());
                    let cancel_notify = notify.clone();
                    let cancel: Arc<dyn Fn() + Send + Sync> = Arc::new(move || cancel_notify.notify_one());
                    let label = format!("child-{i}");
                    let result = async move {
                        if cancellable {
                            notify.notified().await;
                        }
                        ChildOutcome { label, success, error: None, payload: None }
                    }
                    .boxed();
                    ChildHandle { cancel, result }
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn empty_child_set_finishes_success_without_in_progress() {
        let runtime = runtime();
        let (tx, rx) = oneshot::channel();
        spawn(
            runtime.clone(),
            JobId::new(1),
            ControllerId::new(1),
            None,
            0,
            false,
            false,
            Box::new(NoopJob),
            None,
            move |record| {
                let _ = tx.send(record);
            },
        );
        let record = rx.await.unwrap();
        assert_eq!(record.state, JobState::Finished);
        assert_eq!(record.extended_state, JobExtendedState::Success);
    }

    #[tokio::test]
    async fn all_children_succeed_finishes_success() {
        let runtime = runtime();
        let (tx, rx) = oneshot::channel();
        spawn(
            runtime.clone(),
            JobId::new(2),
            ControllerId::new(1),
            None,
            0,
            false,
            false,
            Box::new(FixedJob { outcomes: vec![(true, false), (true, false)] }),
            None,
            move |record| {
                let _ = tx.send(record);
            },
        );
        let record = rx.await.unwrap();
        assert_eq!(record.extended_state, JobExtendedState::Success);
    }

    #[tokio::test]
    async fn a_failed_child_fails_the_job() {
        let runtime = runtime();
        let (tx, rx) = oneshot::channel();
        spawn(
            runtime.clone(),
            JobId::new(3),
            ControllerId::new(1),
            None,
            0,
            false,
            false,
            Box::new(FixedJob { outcomes: vec![(true, false), (false, false)] }),
            None,
            move |record| {
                let _ = tx.send(record);
            },
        );
        let record = rx.await.unwrap();
        assert_eq!(record.extended_state, JobExtendedState::Failed);
    }

    #[tokio::test]
    async fn cancelling_mid_flight_cancels_children_and_finishes_cancelled() {
        let runtime = runtime();
        let (tx, rx) = oneshot::channel();
        let handle = spawn(
            runtime.clone(),
            JobId::new(4),
            ControllerId::new(1),
            None,
            0,
            false,
            false,
            Box::new(FixedJob { outcomes: vec![(true, true)] }),
            None,
            move |record| {
                let _ = tx.send(record);
            },
        );
        // Give the job a moment to reach IN_PROGRESS before cancelling.
        tokio::task::yield_now().await;
        handle.cancel();

        let record = rx.await.unwrap();
        assert_eq!(record.extended_state, JobExtendedState::Cancelled);
    }
}
