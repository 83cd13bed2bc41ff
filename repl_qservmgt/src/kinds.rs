use repl_proto::StatusCode;
use repl_types::{ChunkNumber, DatabaseName, ExtendedState, WorkerName};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One of the five control-plane operations the query-engine workers
/// answer, mirroring `AddReplicaQservMgtRequest`, `RemoveReplicaQservMgtRequest`,
/// `SetReplicasQservMgtRequest`, `GetStatusQservMgtRequest`, and
/// `TestEchoQservMgtRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QservMgtRequestType {
    AddReplica,
    RemoveReplica,
    SetReplicas,
    GetStatus,
    TestEcho,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub extended_state: ExtendedState,
    pub server_error: Option<String>,
    pub response: Option<Value>,
}

/// Per-kind JSON serialization and status-to-`ExtendedState` mapping,
/// mirrored from `repl_request::RequestBehavior` but over a JSON body
/// rather than a bincode-encoded one. `ServerBadResponse` is this
/// hierarchy's own addition to the shared `ExtendedState`, returned when a
/// worker's JSON body fails to match the shape a handler expects.
pub trait QservMgtBehavior: std::fmt::Debug + Send + Sync {
    fn request_type(&self) -> QservMgtRequestType;

    fn to_json(&self) -> Value;

    fn analyze_response(&self, status: StatusCode, body: Value) -> Outcome;

    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

fn status_to_extended_state(status: StatusCode) -> ExtendedState {
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

fn simple_outcome(status: StatusCode, response: Option<Value>) -> Outcome {
    Outcome {
        extended_state: status_to_extended_state(status),
        server_error: None,
        response,
    }
}

fn bad_response(message: impl Into<String>) -> Outcome {
    Outcome {
        extended_state: ExtendedState::ServerBadResponse,
        server_error: Some(message.into()),
        response: None,
    }
}

#[derive(Debug)]
pub struct AddReplicaBehavior {
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
}

impl QservMgtBehavior for AddReplicaBehavior {
    fn request_type(&self) -> QservMgtRequestType {
        QservMgtRequestType::AddReplica
    }
    fn to_json(&self) -> Value {
        json!({ "database": self.database.as_str(), "chunk": self.chunk.get() })
    }
    fn analyze_response(&self, status: StatusCode, body: Value) -> Outcome {
        if status == StatusCode::Success && !body.is_null() && !body.is_object() {
            return bad_response("AddReplica response body was not a JSON object");
        }
        simple_outcome(status, Some(body))
    }
    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        vec![("database".into(), self.database.as_str().into()), ("chunk".into(), self.chunk.to_string())]
    }
}

#[derive(Debug)]
pub struct RemoveReplicaBehavior {
    pub database: DatabaseName,
    pub chunk: ChunkNumber,
    pub force: bool,
}

impl QservMgtBehavior for RemoveReplicaBehavior {
    fn request_type(&self) -> QservMgtRequestType {
        QservMgtRequestType::RemoveReplica
    }
    fn to_json(&self) -> Value {
        json!({ "database": self.database.as_str(), "chunk": self.chunk.get(), "force": self.force })
    }
    fn analyze_response(&self, status: StatusCode, body: Value) -> Outcome {
        simple_outcome(status, Some(body))
    }
    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        vec![
            ("database".into(), self.database.as_str().into()),
            ("chunk".into(), self.chunk.to_string()),
            ("force".into(), self.force.to_string()),
        ]
    }
}

#[derive(Debug)]
pub struct SetReplicasBehavior {
    pub database: DatabaseName,
    pub chunks: Vec<ChunkNumber>,
    pub force: bool,
}

impl QservMgtBehavior for SetReplicasBehavior {
    fn request_type(&self) -> QservMgtRequestType {
        QservMgtRequestType::SetReplicas
    }
    fn to_json(&self) -> Value {
        json!({
            "database": self.database.as_str(),
            "chunks": self.chunks.iter().map(|c| c.get()).collect::<Vec<_>>(),
            "force": self.force,
        })
    }
    fn analyze_response(&self, status: StatusCode, body: Value) -> Outcome {
        simple_outcome(status, Some(body))
    }
}

#[derive(Debug)]
pub struct GetStatusBehavior {
    pub worker: WorkerName,
}

impl QservMgtBehavior for GetStatusBehavior {
    fn request_type(&self) -> QservMgtRequestType {
        QservMgtRequestType::GetStatus
    }
    fn to_json(&self) -> Value {
        json!({ "worker": self.worker.to_string() })
    }
    fn analyze_response(&self, status: StatusCode, body: Value) -> Outcome {
        if status == StatusCode::Success && !body.is_object() {
            return bad_response("GetStatus response body was not a JSON object");
        }
        simple_outcome(status, Some(body))
    }
}

#[derive(Debug)]
pub struct TestEchoBehavior {
    pub data: String,
}

impl QservMgtBehavior for TestEchoBehavior {
    fn request_type(&self) -> QservMgtRequestType {
        QservMgtRequestType::TestEcho
    }
    fn to_json(&self) -> Value {
        json!({ "data": self.data })
    }
    fn analyze_response(&self, status: StatusCode, body: Value) -> Outcome {
        match (status, body.get("data_echo").and_then(Value::as_str)) {
            (StatusCode::Success, Some(echo)) if echo == self.data => {
                simple_outcome(status, Some(json!({ "data_echo": echo })))
            }
            (StatusCode::Success, Some(echo)) => {
                bad_response(format!("echo mismatch: expected {:?}, got {echo:?}", self.data))
            }
            (StatusCode::Success, None) => bad_response("echo response missing data_echo field"),
            (status, _) => simple_outcome(status, None),
        }
    }
    fn extended_persistent_state(&self) -> Vec<(String, String)> {
        vec![("data_length_bytes".into(), self.data.len().to_string())]
    }
}
