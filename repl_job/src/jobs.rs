use std::collections::HashMap;

use async_trait::async_trait;
use repl_qservmgt::{GetStatusBehavior, SetReplicasBehavior, TestEchoBehavior};
use repl_request::{DeleteBehavior, FindAllReplicasBehavior, ReplicateBehavior, SqlBehavior};
use repl_types::{ChunkNumber, DatabaseName, JobType, Replica, ReplicaStatus};

use crate::behavior::{ChildHandle, ChildOutcome, ChildPayload, JobBehavior, JobRuntime};
use crate::dispatch::{dispatch_qservmgt, dispatch_request};

fn enabled_workers(runtime: &JobRuntime) -> Vec<repl_types::Worker> {
    runtime.config.workers().into_iter().filter(|w| w.enabled).collect()
}

/// Issues a `FindAllReplicas` request to every enabled worker for every
/// database in scope. The aggregated response is the authoritative
/// snapshot written back via `saveReplicaInfoCollection`.
#[derive(Debug)]
pub struct FindAllJob {
    pub database: DatabaseName,
}

#[async_trait]
impl JobBehavior for FindAllJob {
    fn job_type(&self) -> JobType {
        JobType::FindAll
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        enabled_workers(runtime)
            .into_iter()
            .map(|w| {
                dispatch_request(
                    runtime,
                    w.name,
                    0,
                    false,
                    true,
                    Box::new(FindAllReplicasBehavior { database: self.database.clone() }),
                    None,
                )
            })
            .collect()
    }
}

/// Computes, per chunk, the shortfall against `min_replicas` and issues
/// `Replicate` requests to bring the chunk back up to the family's target
/// count. Source worker selection ("preferring lower load / more free
/// space") is left as a simple first-good-holder pick over existing
/// replicas until the worker load/capacity feed described in 4.7 exists;
/// the destination set is every enabled worker not already holding a
/// replica for the chunk.
#[derive(Debug)]
pub struct ReplicateJob {
    pub database: DatabaseName,
    pub min_replicas: u32,
}

impl ReplicateJob {
    async fn shortfalls(&self, runtime: &JobRuntime) -> Vec<(ChunkNumber, repl_types::WorkerName, repl_types::WorkerName)> {
        let replicas = runtime
            .store
            .find_replicas(&self.database, None)
            .await
            .unwrap_or_default();
        let workers = enabled_workers(runtime);

        let mut by_chunk: HashMap<ChunkNumber, Vec<&Replica>> = HashMap::new();
        for r in &replicas {
            by_chunk.entry(r.chunk).or_default().push(r);
        }

        let mut plan = Vec::new();
        for (chunk, holders) in by_chunk {
            let good: Vec<&Replica> = holders
                .iter()
                .copied()
                .filter(|r| {
                    let enabled = workers.iter().any(|w| w.name == r.worker && w.enabled);
                    r.is_good(enabled)
                })
                .collect();
            if good.len() as u32 >= self.min_replicas {
                continue;
            }
            let Some(source) = good.first() else { continue };
            let source_worker = source.worker.clone();
            let missing = self.min_replicas - good.len() as u32;
            let candidates: Vec<_> = workers
                .iter()
                .filter(|w| !holders.iter().any(|r| r.worker == w.name))
                .map(|w| w.name.clone())
                .collect();
            for dest in candidates.into_iter().take(missing as usize) {
                plan.push((chunk, source_worker.clone(), dest));
            }
        }
        plan
    }
}

#[async_trait]
impl JobBehavior for ReplicateJob {
    fn job_type(&self) -> JobType {
        JobType::Replicate
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        self.shortfalls(runtime)
            .await
            .into_iter()
            .map(|(chunk, source_worker, dest)| {
                dispatch_request(
                    runtime,
                    dest,
                    0,
                    true,
                    false,
                    Box::new(ReplicateBehavior { database: self.database.clone(), chunk, source_worker }),
                    None,
                )
            })
            .collect()
    }
}

/// Removes replicas beyond `max_replicas` or for chunks/databases no
/// longer in scope, via `Delete`. The placement plan (which
/// `(chunk, worker)` pairs to remove) is computed by the caller from the
/// family's current snapshot and handed in, since it depends on
/// colocation across every database in the family, not just this one.
#[derive(Debug)]
pub struct PurgeJob {
    pub database: DatabaseName,
    pub targets: Vec<(ChunkNumber, repl_types::WorkerName)>,
}

#[async_trait]
impl JobBehavior for PurgeJob {
    fn job_type(&self) -> JobType {
        JobType::Purge
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        self.targets
            .iter()
            .cloned()
            .map(|(chunk, worker)| {
                dispatch_request(runtime, worker, 0, true, false, Box::new(DeleteBehavior { database: self.database.clone(), chunk }), None)
            })
            .collect()
    }
}

/// Moves a chunk from one worker to another: Replicate to the destination.
/// This job only issues the Replicate half; the caller chains a PurgeJob
/// for the source once it observes SUCCESS, so a crash mid-move never
/// leaves a chunk under-replicated.
#[derive(Debug)]
pub struct MoveJob {
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
    pub source_worker: repl_types::WorkerName,
    pub dest_worker: repl_types::WorkerName,
}

#[async_trait]
impl JobBehavior for MoveJob {
    fn job_type(&self) -> JobType {
        JobType::Move
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        vec![dispatch_request(
            runtime,
            self.dest_worker.clone(),
            0,
            true,
            false,
            Box::new(ReplicateBehavior {
                database: self.database.clone(),
                chunk: self.chunk,
                source_worker: self.source_worker.clone(),
            }),
            None,
        )]
    }
}

/// Shapes placement across a family's databases to respect colocation:
/// every database in the family must carry the same chunk on the same set
/// of workers. Takes a precomputed list of moves (built by the caller from
/// the family's current snapshot) rather than recomputing it here, since
/// colocation spans every database in the family at once.
#[derive(Debug)]
pub struct RebalanceJob {
    pub moves: Vec<MoveJob>,
}

#[async_trait]
impl JobBehavior for RebalanceJob {
    fn job_type(&self) -> JobType {
        JobType::Rebalance
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        let mut children = Vec::new();
        for m in &self.moves {
            children.extend(m.spawn_children(runtime).await);
        }
        children
    }
}

/// ServiceStatus (modeled here as `Status`) to replication workers and
/// `TestEcho` to query workers, all under the job's own deadline. Good iff
/// every probe succeeded.
#[derive(Debug)]
pub struct ClusterHealthJob {
    pub replication_workers: Vec<repl_types::WorkerName>,
    pub query_workers: Vec<repl_types::WorkerName>,
}

#[async_trait]
impl JobBehavior for ClusterHealthJob {
    fn job_type(&self) -> JobType {
        JobType::ClusterHealth
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        let mut children: Vec<ChildHandle> = self
            .replication_workers
            .iter()
            .cloned()
            .map(|w| {
                dispatch_request(
                    runtime,
                    w,
                    0,
                    false,
                    true,
                    Box::new(repl_request::StatusBehavior { target_request_id: String::new() }),
                    None,
                )
            })
            .collect();
        children.extend(
            self.query_workers
                .iter()
                .cloned()
                .map(|w| dispatch_qservmgt(runtime, w, Box::new(TestEchoBehavior { data: "ping".into() }), None)),
        );
        children
    }

    fn finalize(&self, children: &[ChildOutcome]) -> bool {
        children.iter().all(|c| c.success)
    }
}

/// For each enabled worker, computes the "good replicas on this worker"
/// set from the store and pushes it via `SetReplicas`. `force` overrides
/// the worker's refusal when a chunk is in use.
#[derive(Debug)]
pub struct QservSyncJob {
    pub database: DatabaseName,
    pub force: bool,
}

#[async_trait]
impl JobBehavior for QservSyncJob {
    fn job_type(&self) -> JobType {
        JobType::QservSync
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        let mut children = Vec::new();
        for worker in enabled_workers(runtime) {
            let replicas = runtime
                .store
                .find_worker_replicas(&worker.name, &self.database)
                .await
                .unwrap_or_default();
            let chunks: Vec<ChunkNumber> = replicas
                .iter()
                .filter(|r| r.status == ReplicaStatus::Complete)
                .map(|r| r.chunk)
                .collect();
            children.push(dispatch_qservmgt(
                runtime,
                worker.name,
                Box::new(SetReplicasBehavior { database: self.database.clone(), chunks, force: self.force }),
                None,
            ));
        }
        children
    }

    fn persistent_log_data(&self, children: &[ChildOutcome]) -> Vec<(String, String)> {
        children
            .iter()
            .map(|c| {
                let previous = match &c.payload {
                    Some(ChildPayload::Json(v)) => v.to_string(),
                    _ => String::new(),
                };
                (c.label.clone(), previous)
            })
            .collect()
    }
}

/// `GetStatus` fan-out across all workers with optional per-worker Task
/// selectors. Tolerates partial failure: a down worker's status is
/// recorded as failed, but the job as a whole still finishes SUCCESS so
/// callers can see the full per-worker picture in one place.
#[derive(Debug)]
pub struct QservStatusJob {
    pub workers: Vec<repl_types::WorkerName>,
}

#[async_trait]
impl JobBehavior for QservStatusJob {
    fn job_type(&self) -> JobType {
        JobType::QservStatus
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        self.workers
            .iter()
            .cloned()
            .map(|w| dispatch_qservmgt(runtime, w.clone(), Box::new(GetStatusBehavior { worker: w }), None))
            .collect()
    }

    fn finalize(&self, _children: &[ChildOutcome]) -> bool {
        true
    }
}

/// Broadcasts a DDL or bounded DML statement to every enabled worker.
#[derive(Debug)]
pub struct SqlJob {
    pub query: String,
}

#[async_trait]
impl JobBehavior for SqlJob {
    fn job_type(&self) -> JobType {
        JobType::Sql
    }

    async fn spawn_children(&self, runtime: &JobRuntime) -> Vec<ChildHandle> {
        enabled_workers(runtime)
            .into_iter()
            .map(|w| dispatch_request(runtime, w.name, 0, false, true, Box::new(SqlBehavior { query: self.query.clone() }), None))
            .collect()
    }
}
