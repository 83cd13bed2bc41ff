use async_trait::async_trait;
use bytes::Bytes;
use repl_types::WorkerName;

use crate::MessengerError;

/// Sends a single framed message to a worker and returns its matched
/// response. Correlating a reply with the request that produced it (by
/// request id) is the transport's job; `Messenger` only decides ordering,
/// priority, and cancellation above this boundary.
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync + 'static {
    async fn send(&self, worker: &WorkerName, body: Bytes) -> Result<Bytes, MessengerError>;

    /// Best-effort notification to the worker that it should stop tracking
    /// `target_request_id`. Errors are logged by the caller, not retried.
    async fn send_stop(&self, worker: &WorkerName, target_request_id: &str) -> Result<(), MessengerError>;
}
