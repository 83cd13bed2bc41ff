use repl_time::Time;

use crate::{ChunkNumber, DatabaseName, RequestId, WorkerName};

/// The kind of outbound worker operation a [`Request`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RequestType {
    Replicate,
    Delete,
    FindReplica,
    FindAllReplicas,
    Echo,
    Sql,
    DirectorIndex,
    Status,
    Stop,
    Dispose,
}

/// Base state machine shared by every [`Request`]: `Created -> InProgress ->
/// Finished`, one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RequestState {
    Created,
    InProgress,
    Finished,
}

/// Outcome chosen at finish time, mapped from the worker's status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExtendedState {
    None,
    Success,
    ClientError,
    ServerBad,
    /// QservMgtRequest-only: the worker replied but its JSON body failed to
    /// parse into the expected shape.
    ServerBadResponse,
    ServerCreated,
    ServerQueued,
    ServerInProgress,
    ServerIsCancelling,
    ServerError,
    ServerChunkInUse,
    ServerCancelled,
    TimeoutExpired,
    Cancelled,
    Expired,
}

impl ExtendedState {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// States a still-enqueued worker-side job may legitimately be in, i.e.
    /// not yet a final outcome from the control plane's point of view.
    pub fn is_worker_in_flight(&self) -> bool {
        matches!(
            self,
            Self::ServerCreated | Self::ServerQueued | Self::ServerInProgress | Self::ServerIsCancelling
        )
    }
}

/// Millisecond (UTC) timestamps recorded across a Request's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Performance {
    pub create_time: Time,
    pub start_time: Option<Time>,
    pub finish_time: Option<Time>,
    pub response_read_time: Option<Time>,
}

impl Performance {
    pub fn new(create_time: Time) -> Self {
        Self {
            create_time,
            start_time: None,
            finish_time: None,
            response_read_time: None,
        }
    }
}

/// One outbound worker operation: owns a state machine, a retry/tracking
/// timer, an expiration timer, persistence hooks, and a single terminal
/// callback. This struct is the storage-agnostic envelope;
/// `repl_request::Request` wraps it with the live dispatch/timer machinery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub request_type: RequestType,
    pub worker: WorkerName,
    pub state: RequestState,
    pub extended_state: ExtendedState,
    pub database: Option<DatabaseName>,
    pub chunk: Option<ChunkNumber>,
    pub server_error: Option<String>,
    pub priority: i32,
    pub keep_tracking: bool,
    pub allow_duplicate: bool,
    /// The worker-side id assigned after the first acknowledgement,
    /// carried in the store's `targetRequestId` column.
    pub target_request_id: Option<String>,
}

impl RequestRecord {
    /// The worker-side fingerprint used for duplicate suppression:
    /// `(type, database, chunk, worker)`.
    pub fn fingerprint(&self) -> (RequestType, Option<&DatabaseName>, Option<ChunkNumber>, &WorkerName) {
        (self.request_type, self.database.as_ref(), self.chunk, &self.worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_distinguishes_worker_and_chunk() {
        let base = RequestRecord {
            id: RequestId::new(1),
            request_type: RequestType::FindReplica,
            worker: "w1".into(),
            state: RequestState::Created,
            extended_state: ExtendedState::None,
            database: Some("D".into()),
            chunk: Some(ChunkNumber::new(7)),
            server_error: None,
            priority: 0,
            keep_tracking: true,
            allow_duplicate: false,
            target_request_id: None,
        };
        let mut other = base.clone();
        other.worker = "w2".into();
        assert_ne!(base.fingerprint(), other.fingerprint());

        let same = base.clone();
        assert_eq!(base.fingerprint(), same.fingerprint());
    }

    #[test]
    fn worker_in_flight_states_identified() {
        assert!(ExtendedState::ServerQueued.is_worker_in_flight());
        assert!(!ExtendedState::Success.is_worker_in_flight());
    }
}
