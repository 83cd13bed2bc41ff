use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use repl_config::Configuration;
use repl_qservmgt::QservMgtRuntime;
use repl_request::RequestRuntime;
use repl_store::DatabaseServices;
use repl_tracker::IdGenerator;
use repl_types::{JobType, Replica};

/// The worker-typed payload a child carried back, narrowed down to the
/// shapes concrete jobs actually aggregate. Everything else (Echo, Sql,
/// DirectorIndex, Disposed, ...) is diagnostic only and not threaded
/// through `ChildOutcome`.
#[derive(Debug, Clone)]
pub enum ChildPayload {
    Replica(Replica),
    Replicas(Vec<Replica>),
    Json(serde_json::Value),
}

/// One child's terminal outcome, folded down from either a `RequestOutcome`
/// or a `QservMgtRequestRecord` by the dispatch helpers in
/// [`crate::dispatch`]. `label` identifies the child for diagnostics
/// (typically a worker name).
#[derive(Debug, Clone)]
pub struct ChildOutcome {
    pub label: String,
    pub success: bool,
    pub error: Option<String>,
    pub payload: Option<ChildPayload>,
}

pub type ChildFuture = BoxFuture<'static, ChildOutcome>;

/// A spawned child operation: `cancel` reaches into the underlying
/// `Request`/`QservMgtRequest` handle, `result` resolves once it is
/// terminal.
pub struct ChildHandle {
    pub cancel: Arc<dyn Fn() + Send + Sync>,
    pub result: ChildFuture,
}

impl std::fmt::Debug for ChildHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildHandle").finish_non_exhaustive()
    }
}

/// Dependencies every concrete job dispatches children through. Owned by
/// the Controller and shared by every `Job` it spawns.
#[derive(Debug, Clone)]
pub struct JobRuntime {
    pub request_runtime: Arc<RequestRuntime>,
    pub qservmgt_runtime: Arc<QservMgtRuntime>,
    pub store: Arc<dyn DatabaseServices>,
    pub config: Arc<Configuration>,
    pub request_ids: Arc<IdGenerator>,
}

/// Per-concrete-job behavior: owns its children vector behind a mutex,
/// driven by an external tick as each child future resolves, then fans out
/// and joins the results into one outcome.
#[async_trait]
pub trait JobBehavior: std::fmt::Debug + Send + Sync {
    fn job_type(&self) -> JobType;

    /// Enumerates targets and issues every child `Request`/`QservMgtRequest`
    /// up front. An empty result finishes the job `FINISHED+SUCCESS`
    /// without ever reaching `IN_PROGRESS`. `async` because several
    /// concrete jobs (`ReplicateJob`, `QservSyncJob`) need a store read to
    /// compute their target set before issuing anything.
    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle>;

    /// Folds every child's terminal outcome into the job's own
    /// `ExtendedState`. The default is "fail if anything failed", which
    /// concrete jobs override when they tolerate partial success (e.g.
    /// `QservStatusJob` records per-worker status and still succeeds).
    fn finalize(&self, children: &[ChildOutcome]) -> bool {
        children.iter().all(|c| c.success)
    }

    /// Name/value rows the store keeps for diagnostics, mirroring
    /// `persistentLogData()`.
    fn persistent_log_data(&self, children: &[ChildOutcome]) -> Vec<(String, String)> {
        children
            .iter()
            .map(|c| (c.label.clone(), if c.success { "OK".to_string() } else { c.error.clone().unwrap_or_default() }))
            .collect()
    }
}
