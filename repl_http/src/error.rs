use http::StatusCode;
use serde_json::json;
use snafu::Snafu;

use crate::envelope::Envelope;

/// Taxonomy of failures a route handler can return; each maps to one HTTP
/// status and a short `error` code in the envelope, never a raw
/// `Display` of the underlying source.
#[derive(Debug, Snafu)]
pub enum HttpError {
    #[snafu(display("route not found"))]
    NotFound,

    #[snafu(display("{method} not allowed on this route"))]
    MethodNotAllowed { method: http::Method },

    #[snafu(display("missing or invalid auth key"))]
    Unauthorized,

    #[snafu(display("malformed request body: {message}"))]
    BadRequest { message: String },

    #[snafu(display("{source}"))]
    Ingest { source: repl_ingest::IngestError },

    #[snafu(display("{source}"))]
    Store { source: repl_store::StoreError },

    #[snafu(display("{source}"))]
    Controller { source: repl_controller::ControllerError },

    #[snafu(display("job was rejected: {message}"))]
    JobRejected { message: String },
}

impl From<repl_ingest::IngestError> for HttpError {
    fn from(source: repl_ingest::IngestError) -> Self {
        Self::Ingest { source }
    }
}

impl From<repl_store::StoreError> for HttpError {
    fn from(source: repl_store::StoreError) -> Self {
        Self::Store { source }
    }
}

impl From<repl_controller::ControllerError> for HttpError {
    fn from(source: repl_controller::ControllerError) -> Self {
        Self::Controller { source }
    }
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Ingest { source } => match source {
                repl_ingest::IngestError::TransactionNotStarted { .. }
                | repl_ingest::IngestError::TableNotRegistered { .. }
                | repl_ingest::IngestError::WorkerUnavailable { .. }
                | repl_ingest::IngestError::InvalidUrl { .. }
                | repl_ingest::IngestError::UnsupportedScheme { .. } => StatusCode::BAD_REQUEST,
                repl_ingest::IngestError::Cancelled => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store { source } => match source {
                repl_store::StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                repl_store::StoreError::AlreadyExists { .. } | repl_store::StoreError::DuplicateEntry => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Controller { source } => match source {
                repl_controller::ControllerError::FamilyBusy { .. } => StatusCode::CONFLICT,
                repl_controller::ControllerError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::JobRejected { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn to_envelope(&self) -> Envelope<()> {
        Envelope::error(self.to_string(), json!({}))
    }
}
