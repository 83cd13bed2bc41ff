use repl_types::{ChunkNumber, DatabaseName, Dialect, Replica, TableName, WorkerName};

use crate::{RequestHeader, ResponseHeader};

/// A header/body pair as it travels together in a single outbound frame.
pub type RequestFrame = (RequestHeader, RequestBody);

/// A header/body pair as it travels together in a single inbound frame.
pub type ResponseFrame = (ResponseHeader, ResponseBody);

/// The typed body of a request frame, one variant per [`repl_types::RequestType`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RequestBody {
    Replicate {
        database: DatabaseName,
        chunk: ChunkNumber,
        source_worker: WorkerName,
    },
    Delete {
        database: DatabaseName,
        chunk: ChunkNumber,
    },
    FindReplica {
        database: DatabaseName,
        chunk: ChunkNumber,
    },
    FindAllReplicas {
        database: DatabaseName,
    },
    Echo {
        payload: String,
        delay_ms: u64,
    },
    Sql {
        query: String,
    },
    DirectorIndex {
        database: DatabaseName,
        table: TableName,
        chunk: ChunkNumber,
    },
    Status {
        target_request_id: String,
    },
    Stop {
        target_request_id: String,
    },
    Dispose {
        target_request_ids: Vec<String>,
    },
}

/// The typed body of a response frame, paired by variant with the request
/// that produced it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ResponseBody {
    Replica(Replica),
    Replicas(Vec<Replica>),
    Echo { payload: String },
    Sql { rows_affected: u64, result_set: Vec<Vec<String>> },
    DirectorIndex { bytes: Vec<u8> },
    Disposed { count: u32 },
    Empty,
}

/// Not part of the request/response body itself, but the SQL-LOAD-DATA
/// dialect an ingest request carries alongside a `Replicate`/contribution
/// body when the worker must parse a CSV payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IngestDialect(pub Dialect);
