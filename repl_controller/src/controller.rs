use std::sync::Arc;

use hashbrown::HashMap;
use observability_deps::tracing::{info, warn};
use parking_lot::Mutex;
use repl_config::Configuration;
use repl_job::{JobBehavior, JobHandle, JobRuntime};
use repl_messenger::{Messenger, Transport};
use repl_qservmgt::{QservMgtBehavior, QservMgtRequestHandle, QservMgtRequestRecord, QservMgtRuntime};
use repl_request::{DuplicateRegistry, RequestBehavior, RequestHandle, RequestOutcome, RequestRuntime};
use repl_store::{ControllerIdentity, DatabaseServices};
use repl_time::{Time, TimeProvider};
use repl_tracker::IdGenerator;
use repl_types::{ControllerId, JobId, JobRecord, RequestId, WorkerName};

use crate::admission::Admission;
use crate::error::Result;

/// Process-wide façade: owns the Messenger, the store handle, the
/// Configuration snapshot, and this process's registered identity. Every
/// Request and Job in the process is attached to exactly one Controller.
#[derive(Debug)]
pub struct Controller {
    pub identity: ControllerIdentity,
    pub config: Arc<Configuration>,
    request_runtime: Arc<RequestRuntime>,
    qservmgt_runtime: Arc<QservMgtRuntime>,
    job_runtime: Arc<JobRuntime>,
    admission: Admission,
    job_ids: IdGenerator,
    request_ids: Arc<IdGenerator>,
    /// Unparented Requests/QservMgtRequests owned directly by this
    /// Controller (parented ones live under their Job's own child
    /// bookkeeping instead), kept here only so `shutdown` can cancel them
    /// too.
    requests: Mutex<HashMap<RequestId, RequestHandle>>,
    qservmgt_requests: Mutex<HashMap<u64, QservMgtRequestHandle>>,
}

impl Controller {
    /// Registers this process's identity in the store and builds the
    /// runtimes every Request/Job dispatches through. One Messenger (and
    /// therefore one `transport`) is shared by both request hierarchies.
    pub async fn start(
        id: ControllerId,
        host: impl Into<String>,
        config: Arc<Configuration>,
        store: Arc<dyn DatabaseServices>,
        transport: Arc<dyn Transport>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let identity = ControllerIdentity {
            id,
            host: host.into(),
            pid: std::process::id(),
            start_time: time_provider.now(),
        };
        store.save_controller(identity.clone()).await?;

        let messenger = Arc::new(Messenger::new(transport));
        let request_ids = Arc::new(IdGenerator::starting_at(1));
        let request_runtime = Arc::new(RequestRuntime {
            messenger: messenger.clone(),
            store: store.clone(),
            duplicates: Arc::new(DuplicateRegistry::new()),
            time_provider: time_provider.clone(),
            instance_id: id.get(),
        });
        let qservmgt_runtime = Arc::new(QservMgtRuntime { messenger, time_provider, instance_id: id.get() });
        let job_runtime = Arc::new(JobRuntime {
            request_runtime: request_runtime.clone(),
            qservmgt_runtime: qservmgt_runtime.clone(),
            store,
            config: config.clone(),
            request_ids: request_ids.clone(),
        });

        info!(controller_id = %identity.id, host = %identity.host, pid = identity.pid, "controller registered");

        Ok(Self {
            identity,
            config,
            request_runtime,
            qservmgt_runtime,
            job_runtime,
            admission: Admission::new(),
            job_ids: IdGenerator::starting_at(1),
            request_ids,
            requests: Mutex::new(HashMap::new()),
            qservmgt_requests: Mutex::new(HashMap::new()),
        })
    }

    /// Submits a Job for admission. Rejects immediately, without spawning
    /// anything, if the job's family is busy and it isn't `preemptive`.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_job(
        self: &Arc<Self>,
        behavior: Box<dyn JobBehavior>,
        parent_id: Option<JobId>,
        priority: i32,
        exclusive: bool,
        preemptive: bool,
        deadline: Option<Time>,
        on_finish: impl FnOnce(JobRecord) + Send + 'static,
    ) -> Result<JobHandle> {
        let job_type = behavior.job_type();
        let id = JobId::new(self.job_ids.next());
        let controller_id = self.identity.id;
        let runtime = Arc::clone(&self.job_runtime);
        let this = Arc::clone(self);

        self.admission.admit_and_spawn(job_type, id, exclusive, preemptive, move || {
            repl_job::spawn(runtime, id, controller_id, parent_id, priority, exclusive, preemptive, behavior, deadline, move |record| {
                this.admission.release(job_type, id);
                on_finish(record);
            })
        })
    }

    /// Submits an unparented Request directly owned by this Controller.
    /// Parented Requests are instead issued by a Job's `spawn_children`,
    /// via the dispatch helpers in `repl_job::dispatch`.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_request(
        self: &Arc<Self>,
        worker: WorkerName,
        priority: i32,
        keep_tracking: bool,
        allow_duplicate: bool,
        behavior: Box<dyn RequestBehavior>,
        deadline: Option<Time>,
        on_finish: impl FnOnce(RequestOutcome) + Send + 'static,
    ) -> RequestHandle {
        let id = RequestId::new(self.request_ids.next());
        let this = Arc::clone(self);
        // Held across the (synchronous, non-blocking) spawn call so the
        // task can't run far enough to call its own removal before this
        // request is actually registered.
        let mut requests = self.requests.lock();
        let handle = repl_request::spawn(
            Arc::clone(&self.request_runtime),
            id,
            worker,
            priority,
            keep_tracking,
            allow_duplicate,
            behavior,
            deadline,
            move |outcome| {
                this.requests.lock().remove(&id);
                on_finish(outcome);
            },
        );
        requests.insert(id, handle.clone());
        handle
    }

    /// Submits an unparented QservMgtRequest directly owned by this
    /// Controller, same shape as [`Self::submit_request`] but over the
    /// query-engine transport.
    pub fn submit_qservmgt_request(
        self: &Arc<Self>,
        worker: WorkerName,
        behavior: Box<dyn QservMgtBehavior>,
        deadline: Option<Time>,
        on_finish: impl FnOnce(QservMgtRequestRecord) + Send + 'static,
    ) -> QservMgtRequestHandle {
        let id = self.request_ids.next();
        let this = Arc::clone(self);
        let mut qservmgt_requests = self.qservmgt_requests.lock();
        let handle = repl_qservmgt::spawn(Arc::clone(&self.qservmgt_runtime), id, worker, behavior, deadline, move |record| {
            this.qservmgt_requests.lock().remove(&id);
            on_finish(record);
        });
        qservmgt_requests.insert(id, handle.clone());
        handle
    }

    /// Propagates cancellation to every live Job and unparented
    /// Request/QservMgtRequest. Does not wait for them to actually finish;
    /// callers observe that through their own `on_finish` callbacks.
    pub fn shutdown(&self) {
        warn!(controller_id = %self.identity.id, "controller shutting down, cancelling all live work");
        self.admission.shutdown();
        for handle in self.requests.lock().values() {
            handle.cancel();
        }
        for handle in self.qservmgt_requests.lock().values() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::FutureExt;
    use repl_job::{ChildHandle, ChildOutcome};
    use repl_messenger::MessengerError;
    use repl_store::MemDatabaseServices;
    use repl_time::MockProvider;
    use repl_types::JobType;

    use super::*;
    use crate::error::ControllerError;

    #[derive(Debug)]
    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, _worker: &WorkerName, body: bytes::Bytes) -> std::result::Result<bytes::Bytes, MessengerError> {
            use repl_proto::{RequestFrame, ResponseFrame};
            let (header, req_body): RequestFrame = bincode::deserialize(&body).unwrap();
            let response_body = match req_body {
                repl_proto::RequestBody::Echo { payload, .. } => repl_proto::ResponseBody::Echo { payload },
                _ => repl_proto::ResponseBody::Empty,
            };
            let response: ResponseFrame = (
                repl_proto::ResponseHeader { id: header.id, status: repl_proto::StatusCode::Success, extended_status: None },
                response_body,
            );
            Ok(bytes::Bytes::from(bincode::serialize(&response).unwrap()))
        }

        async fn send_stop(&self, _worker: &WorkerName, _target_request_id: &str) -> std::result::Result<(), MessengerError> {
            Ok(())
        }
    }

    async fn controller() -> Arc<Controller> {
        let controller = Controller::start(
            ControllerId::new(1),
            "localhost",
            Arc::new(Configuration::new()),
            Arc::new(MemDatabaseServices::new()),
            Arc::new(EchoTransport),
            Arc::new(MockProvider::new(Time::from_millis(0))),
        )
        .await
        .unwrap();
        Arc::new(controller)
    }

    #[derive(Debug)]
    struct HangingJob;

    #[async_trait]
    impl JobBehavior for HangingJob {
        fn job_type(&self) -> JobType {
            JobType::Replicate
        }

        async fn spawn_children(&self, _runtime: &JobRuntime) -> Vec<ChildHandle> {
            let notify = Arc::new(tokio::sync::Notify::new());
            let cancel_notify = notify.clone();
            let cancel: Arc<dyn Fn() + Send + Sync> = Arc::new(move || cancel_notify.notify_one());
            let result = async move {
                notify.notified().await;
                ChildOutcome { label: "child".into(), success: true, error: None, payload: None }
            }
            .boxed();
            vec![ChildHandle { cancel, result }]
        }
    }

    #[tokio::test]
    async fn submit_request_completes_and_deregisters() {
        let controller = controller().await;
        let (tx, rx) = tokio::sync::oneshot::channel();
        controller.submit_request(
            WorkerName::new("w1"),
            0,
            false,
            true,
            Box::new(repl_request::EchoBehavior { payload: "ping".into(), delay_ms: 0 }),
            None,
            move |outcome| {
                let _ = tx.send(outcome);
            },
        );
        let outcome = rx.await.unwrap();
        assert_eq!(outcome.record.extended_state, repl_types::ExtendedState::Success);
        assert!(controller.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn submit_job_rejects_when_family_busy_and_not_preemptive() {
        let controller = controller().await;
        let _h1 = controller.submit_job(Box::new(HangingJob), None, 0, true, false, None, |_| {}).unwrap();
        let err = controller.submit_job(Box::new(HangingJob), None, 0, true, false, None, |_| {}).unwrap_err();
        assert!(matches!(err, ControllerError::FamilyBusy { job_type: JobType::Replicate }));
    }

    #[tokio::test]
    async fn shutdown_cancels_live_jobs_and_requests() {
        let controller = controller().await;
        let handle = controller.submit_job(Box::new(HangingJob), None, 0, true, false, None, |_| {}).unwrap();
        controller.shutdown();
        assert!(handle.is_cancelled());
    }
}
