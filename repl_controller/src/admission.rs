use hashbrown::HashMap;
use parking_lot::Mutex;
use repl_job::JobHandle;
use repl_types::{JobId, JobType};

use crate::error::{ControllerError, Result};

struct Admitted {
    id: JobId,
    exclusive: bool,
    handle: JobHandle,
}

/// Tracks live (non-finished) Jobs grouped by [`JobType`], the admission
/// family named in 4.7: a family is "busy" while any job of that type is
/// registered. `exclusive` jobs require sole occupancy of their family;
/// `preemptive` lets an exclusive job bump (cancel) everyone already
/// occupying it instead of being rejected.
#[derive(Debug, Default)]
pub struct Admission {
    running: Mutex<HashMap<JobType, Vec<Admitted>>>,
}

impl Admission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the admission check and, if it passes, calls `spawn` and
    /// registers its handle, all under one lock. Holding the lock across
    /// `spawn` (which only creates a tokio task and returns, never awaits)
    /// closes the race where the new job could finish and call
    /// [`Self::release`] before it was ever registered.
    pub fn admit_and_spawn(
        &self,
        job_type: JobType,
        id: JobId,
        exclusive: bool,
        preemptive: bool,
        spawn: impl FnOnce() -> JobHandle,
    ) -> Result<JobHandle> {
        let mut running = self.running.lock();
        let entry = running.entry(job_type).or_default();
        let exclusive_running = entry.iter().any(|j| j.exclusive);

        if exclusive && !entry.is_empty() {
            if !preemptive {
                return Err(ControllerError::FamilyBusy { job_type });
            }
            for bumped in entry.drain(..) {
                bumped.handle.cancel();
            }
        } else if !exclusive && exclusive_running {
            return Err(ControllerError::FamilyBusy { job_type });
        }

        let handle = spawn();
        entry.push(Admitted { id, exclusive, handle: handle.clone() });
        Ok(handle)
    }

    pub fn release(&self, job_type: JobType, id: JobId) {
        if let Some(entry) = self.running.lock().get_mut(&job_type) {
            entry.retain(|j| j.id != id);
        }
    }

    /// Cancels every live job, regardless of family.
    pub fn shutdown(&self) {
        for jobs in self.running.lock().values() {
            for j in jobs {
                j.handle.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::FutureExt;
    use repl_config::Configuration;
    use repl_job::{ChildHandle, ChildOutcome, JobBehavior, JobRuntime};
    use repl_messenger::{Messenger, MessengerError, Transport};
    use repl_qservmgt::QservMgtRuntime;
    use repl_request::{DuplicateRegistry, RequestRuntime};
    use repl_store::MemDatabaseServices;
    use repl_time::{MockProvider, Time};
    use repl_tracker::IdGenerator;
    use repl_types::{ControllerId, WorkerName};

    use super::*;

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
                duplicates: Arc::new(DuplicateRegistry::new()),
                time_provider: time_provider.clone(),
                instance_id: 1,
            }),
            qservmgt_runtime: Arc::new(QservMgtRuntime { messenger, time_provider, instance_id: 1 }),
            store: Arc::new(MemDatabaseServices::new()),
            config: Arc::new(Configuration::new()),
            request_ids: Arc::new(IdGenerator::starting_at(1)),
        })
    }

    /// A single child that only resolves once cancelled, so a spawned job
    /// stays live until the test explicitly bumps or releases it.
    #[derive(Debug)]
    struct HangingJob(JobType);

    #[async_trait]
    impl JobBehavior for HangingJob {
        fn job_type(&self) -> JobType {
            self.0
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

    fn spawn_hanging(runtime: &Arc<JobRuntime>, id: u64, job_type: JobType) -> JobHandle {
        repl_job::spawn(
            Arc::clone(runtime),
            JobId::new(id),
            ControllerId::new(1),
            None,
            0,
            false,
            false,
            Box::new(HangingJob(job_type)),
            None,
            |_record| {},
        )
    }

    #[tokio::test]
    async fn second_exclusive_job_is_rejected_without_preemption() {
        let runtime = runtime();
        let admission = Admission::new();
        let h1 = admission
            .admit_and_spawn(JobType::Replicate, JobId::new(1), true, false, || spawn_hanging(&runtime, 1, JobType::Replicate))
            .unwrap();
        let err = admission
            .admit_and_spawn(JobType::Replicate, JobId::new(2), true, false, || spawn_hanging(&runtime, 2, JobType::Replicate))
            .unwrap_err();
        assert!(matches!(err, ControllerError::FamilyBusy { job_type: JobType::Replicate }));
        assert!(!h1.is_cancelled());
    }

    #[tokio::test]
    async fn preemptive_exclusive_job_bumps_the_occupant() {
        let runtime = runtime();
        let admission = Admission::new();
        let h1 = admission
            .admit_and_spawn(JobType::Replicate, JobId::new(1), true, false, || spawn_hanging(&runtime, 1, JobType::Replicate))
            .unwrap();
        let h2 = admission
            .admit_and_spawn(JobType::Replicate, JobId::new(2), true, true, || spawn_hanging(&runtime, 2, JobType::Replicate))
            .unwrap();
        assert!(h1.is_cancelled());
        assert!(!h2.is_cancelled());
    }

    #[tokio::test]
    async fn non_exclusive_jobs_coexist() {
        let runtime = runtime();
        let admission = Admission::new();
        admission
            .admit_and_spawn(JobType::FindAll, JobId::new(1), false, false, || spawn_hanging(&runtime, 1, JobType::FindAll))
            .unwrap();
        admission
            .admit_and_spawn(JobType::FindAll, JobId::new(2), false, false, || spawn_hanging(&runtime, 2, JobType::FindAll))
            .unwrap();
    }

    #[tokio::test]
    async fn release_frees_the_family_for_a_new_exclusive_job() {
        let runtime = runtime();
        let admission = Admission::new();
        admission
            .admit_and_spawn(JobType::Sql, JobId::new(1), true, false, || spawn_hanging(&runtime, 1, JobType::Sql))
            .unwrap();
        admission.release(JobType::Sql, JobId::new(1));
        admission
            .admit_and_spawn(JobType::Sql, JobId::new(2), true, false, || spawn_hanging(&runtime, 2, JobType::Sql))
            .unwrap();
    }
}
