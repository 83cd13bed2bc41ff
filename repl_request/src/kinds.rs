use repl_proto::{RequestBody, ResponseBody, StatusCode};
use repl_types::{ChunkNumber, DatabaseName, ExtendedState, RequestType, TableName, WorkerName};

/// The outcome of matching a worker's reply against the request that
/// produced it: the `ExtendedState` to move to, an optional server-supplied
/// error string, and the typed payload to hand back to the caller.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub extended_state: ExtendedState,
    pub server_error: Option<String>,
    pub response: Option<ResponseBody>,
}

/// Per-kind behavior: each concrete request type owns its own wire
/// serialization, its own mapping from worker status to `ExtendedState`,
/// and its own set of name/value pairs persisted for post-mortem.
/// `repl_request::Request` holds one of these as a `Box<dyn
/// RequestBehavior>` rather than branching on `RequestType` itself.
pub trait RequestBehavior: std::fmt::Debug + Send + Sync {
    fn request_type(&self) -> RequestType;

    fn database(&self) -> Option<&DatabaseName> {
        None
    }

    fn chunk(&self) -> Option<ChunkNumber> {
        None
    }

    fn to_wire(&self) -> RequestBody;

    /// Maps a worker's status code plus response body to an `Outcome`.
    /// `ServerBad` is not representable in a successful worker reply; a
    /// handler returns it only when the body fails to match its expected
    /// shape.
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome;

    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

fn status_to_success_extended_state(status: StatusCode) -> ExtendedState {
    match status {
        StatusCode::Success => ExtendedState::Success,
        StatusCode::Created => ExtendedState::ServerCreated,
        StatusCode::Queued => ExtendedState::ServerQueued,
        StatusCode::InProgress => ExtendedState::ServerInProgress,
        StatusCode::IsCancelling => ExtendedState::ServerIsCancelling,
        StatusCode::Bad => ExtendedState::ServerBad,
        StatusCode::Failed => ExtendedState::ServerError,
        StatusCode::Cancelled => ExtendedState::ServerCancelled,
    }
}

#[derive(Debug)]
pub struct ReplicateBehavior {
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
    pub source_worker: WorkerName,
}

impl RequestBehavior for ReplicateBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Replicate
    }
    fn database(&self) -> Option<&DatabaseName> {
        Some(&self.database)
    }
    fn chunk(&self) -> Option<ChunkNumber> {
        Some(self.chunk)
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Replicate {
            database: self.database.clone(),
            chunk: self.chunk,
            source_worker: self.source_worker.clone(),
        }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(ResponseBody::Replica(r))) => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(ResponseBody::Replica(r)),
            },
            (status, _) if status_to_success_extended_state(status).is_worker_in_flight() => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: Some(format!("unexpected response shape for Replicate: status={status:?}")),
                response: None,
            },
        }
    }
    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        vec![
            ("database".into(), self.database.as_str().into()),
            ("chunk".into(), self.chunk.to_string()),
            ("sourceWorker".into(), self.source_worker.to_string()),
        ]
    }
}

#[derive(Debug)]
pub struct DeleteBehavior {
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
}

impl RequestBehavior for DeleteBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Delete
    }
    fn database(&self) -> Option<&DatabaseName> {
        Some(&self.database)
    }
    fn chunk(&self) -> Option<ChunkNumber> {
        Some(self.chunk)
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Delete {
            database: self.database.clone(),
            chunk: self.chunk,
        }
    }
    fn analyze_response(&self, status: StatusCode, _body: Option<ResponseBody>) -> Outcome {
        Outcome {
            extended_state: status_to_success_extended_state(status),
            server_error: None,
            response: None,
        }
    }
    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        vec![("database".into(), self.database.as_str().into()), ("chunk".into(), self.chunk.to_string())]
    }
}

#[derive(Debug)]
pub struct FindReplicaBehavior {
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
}

impl RequestBehavior for FindReplicaBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::FindReplica
    }
    fn database(&self) -> Option<&DatabaseName> {
        Some(&self.database)
    }
    fn chunk(&self) -> Option<ChunkNumber> {
        Some(self.chunk)
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::FindReplica {
            database: self.database.clone(),
            chunk: self.chunk,
        }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(ResponseBody::Replica(r))) => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(ResponseBody::Replica(r)),
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
        }
    }
}

#[derive(Debug)]
pub struct FindAllReplicasBehavior {
    pub database: DatabaseName,
}

impl RequestBehavior for FindAllReplicasBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::FindAllReplicas
    }
    fn database(&self) -> Option<&DatabaseName> {
        Some(&self.database)
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::FindAllReplicas {
            database: self.database.clone(),
        }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(ResponseBody::Replicas(rs))) => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(ResponseBody::Replicas(rs)),
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
        }
    }
}

#[derive(Debug)]
pub struct EchoBehavior {
    pub payload: String,
    pub delay_ms: u64,
}

impl RequestBehavior for EchoBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Echo
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Echo {
            payload: self.payload.clone(),
            delay_ms: self.delay_ms,
        }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(ResponseBody::Echo { payload })) if payload == self.payload => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(ResponseBody::Echo { payload }),
            },
            (StatusCode::Success, Some(ResponseBody::Echo { payload })) => Outcome {
                extended_state: ExtendedState::ServerBad,
                server_error: Some(format!("echo payload mismatch: expected {:?}, got {payload:?}", self.payload)),
                response: None,
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
        }
    }
}

#[derive(Debug)]
pub struct SqlBehavior {
    pub query: String,
}

impl RequestBehavior for SqlBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Sql
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Sql { query: self.query.clone() }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(sql @ ResponseBody::Sql { .. })) => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(sql),
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
        }
    }
    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        vec![("query".into(), self.query.clone())]
    }
}

#[derive(Debug)]
pub struct DirectorIndexBehavior {
    pub database: DatabaseName,
    pub table: TableName,
    pub chunk: ChunkNumber,
}

impl RequestBehavior for DirectorIndexBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::DirectorIndex
    }
    fn database(&self) -> Option<&DatabaseName> {
        Some(&self.database)
    }
    fn chunk(&self) -> Option<ChunkNumber> {
        Some(self.chunk)
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::DirectorIndex {
            database: self.database.clone(),
            table: self.table.clone(),
            chunk: self.chunk,
        }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(idx @ ResponseBody::DirectorIndex { .. })) => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(idx),
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
        }
    }
}

#[derive(Debug)]
pub struct StatusBehavior {
    pub target_request_id: String,
}

impl RequestBehavior for StatusBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Status
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Status {
            target_request_id: self.target_request_id.clone(),
        }
    }
    fn analyze_response(&self, status: StatusCode, _body: Option<ResponseBody>) -> Outcome {
        Outcome {
            extended_state: status_to_success_extended_state(status),
            server_error: None,
            response: None,
        }
    }
}

#[derive(Debug)]
pub struct StopBehavior {
    pub target_request_id: String,
}

impl RequestBehavior for StopBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Stop
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Stop {
            target_request_id: self.target_request_id.clone(),
        }
    }
    fn analyze_response(&self, status: StatusCode, _body: Option<ResponseBody>) -> Outcome {
        Outcome {
            extended_state: status_to_success_extended_state(status),
            server_error: None,
            response: None,
        }
    }
}

#[derive(Debug)]
pub struct DisposeBehavior {
    pub target_request_ids: Vec<String>,
}

impl RequestBehavior for DisposeBehavior {
    fn request_type(&self) -> RequestType {
        RequestType::Dispose
    }
    fn to_wire(&self) -> RequestBody {
        RequestBody::Dispose {
            target_request_ids: self.target_request_ids.clone(),
        }
    }
    fn analyze_response(&self, status: StatusCode, body: Option<ResponseBody>) -> Outcome {
        match (status, body) {
            (StatusCode::Success, Some(d @ ResponseBody::Disposed { .. })) => Outcome {
                extended_state: ExtendedState::Success,
                server_error: None,
                response: Some(d),
            },
            (status, _) => Outcome {
                extended_state: status_to_success_extended_state(status),
                server_error: None,
                response: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_mismatch_is_server_bad() {
        let behavior = EchoBehavior { payload: "ping".into(), delay_ms: 0 };
        let outcome = behavior.analyze_response(StatusCode::Success, Some(ResponseBody::Echo { payload: "pong".into() }));
        assert_eq!(outcome.extended_state, ExtendedState::ServerBad);
        assert!(outcome.server_error.is_some());
    }

    #[test]
    fn replicate_in_flight_status_does_not_finish() {
        let behavior = ReplicateBehavior {
            database: "D".into(),
            chunk: ChunkNumber::new(1),
            source_worker: "w1".into(),
        };
        let outcome = behavior.analyze_response(StatusCode::Queued, None);
        assert_eq!(outcome.extended_state, ExtendedState::ServerQueued);
        assert!(outcome.extended_state.is_worker_in_flight());
    }
}
