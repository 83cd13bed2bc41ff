use snafu::Snafu;

/// The taxonomy of failures `DatabaseServices` can raise. Vendor-specific
/// errors (a Postgres code, a broken connection) are translated into this
/// set once, at the edge, in [`crate::postgres::from_sqlx_error`]; every
/// other layer in the workspace consumes and propagates only these kinds.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("store transport error: {source}"))]
    Transport { source: sqlx::Error },

    #[snafu(display("failed to connect to the store: {source}"))]
    Connect { source: sqlx::Error },

    #[snafu(display("exceeded the maximum number of reconnect attempts ({attempts})"))]
    MaxReconnectsExceeded { attempts: u32 },

    /// The pool reconnected mid-call; the caller's last logical operation
    /// (e.g. a transaction state transition) must be retried from scratch
    /// rather than assumed to have landed.
    #[snafu(display("store connection was re-established; retry the operation"))]
    Reconnected,

    #[snafu(display("duplicate entry"))]
    DuplicateEntry,

    #[snafu(display("referenced row does not exist"))]
    NoReferencedRow,

    #[snafu(display("not found: {what}"))]
    NotFound { what: String },

    #[snafu(display("already exists: {what}"))]
    AlreadyExists { what: String },

    #[snafu(display("invalid state transition: {message}"))]
    InvalidTransition { message: String },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
