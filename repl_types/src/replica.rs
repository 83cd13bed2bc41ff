use repl_time::Time;

use crate::{ChunkNumber, DatabaseName, WorkerName};

/// The worker-reported status of one chunk replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReplicaStatus {
    NotFound,
    CreateInProgress,
    Complete,
    DeleteInProgress,
}

/// One file belonging to a replica (a chunk's data, index, or overlap file).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReplicaFile {
    pub name: String,
    pub size: u64,
    pub mtime: Time,
    pub checksum: u64,
}

/// A concrete copy of a chunk of a database on a named worker.
///
/// A replica is *good* iff `status == Complete` and its worker is enabled
/// — see [`Replica::is_good`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Replica {
    pub worker: WorkerName,
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
    pub status: ReplicaStatus,
    pub verify_time: Option<Time>,
    pub files: Vec<ReplicaFile>,
}

impl Replica {
    pub fn is_good(&self, worker_enabled: bool) -> bool {
        worker_enabled && self.status == ReplicaStatus::Complete
    }

    /// Ordering key used throughout `repl_store`'s read views:
    /// `(database, chunk, worker)` lexicographic.
    pub fn sort_key(&self) -> (&str, u32, &str) {
        (self.database.as_str(), self.chunk.get(), self.worker.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica(worker: &str, status: ReplicaStatus) -> Replica {
        Replica {
            worker: worker.into(),
            database: "D".into(),
            chunk: ChunkNumber::new(7),
            status,
            verify_time: None,
            files: vec![],
        }
    }

    #[test]
    fn good_requires_complete_and_enabled_worker() {
        let r = replica("w1", ReplicaStatus::Complete);
        assert!(r.is_good(true));
        assert!(!r.is_good(false));
        assert!(!replica("w1", ReplicaStatus::CreateInProgress).is_good(true));
    }

    #[test]
    fn sort_key_orders_by_database_then_chunk_then_worker() {
        let mut replicas = vec![
            replica("w2", ReplicaStatus::Complete),
            replica("w1", ReplicaStatus::Complete),
        ];
        replicas.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        assert_eq!(replicas[0].worker.as_str(), "w1");
        assert_eq!(replicas[1].worker.as_str(), "w2");
    }
}
