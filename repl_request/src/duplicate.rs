use hashbrown::HashMap;
use parking_lot::Mutex;
use repl_types::{ChunkNumber, DatabaseName, RequestType, WorkerName};
use tokio::sync::broadcast;

use crate::RequestOutcomeRecord;

/// Worker-side fingerprint used for duplicate suppression:
/// `(type, database, chunk, worker)`.
pub type Fingerprint = (RequestType, Option<DatabaseName>, Option<ChunkNumber>, WorkerName);

/// Tracks in-flight, non-`allow_duplicate` requests by fingerprint so a
/// second request matching an already-enqueued one joins it instead of
/// creating a second worker-side job. Mirrors workers reporting
/// `SERVER_DUPLICATE`, which the control plane here short-circuits before
/// ever reaching the wire.
#[derive(Debug, Default)]
pub struct DuplicateRegistry {
    inflight: Mutex<HashMap<Fingerprint, broadcast::Sender<RequestOutcomeRecord>>>,
}

impl DuplicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// If a request with this fingerprint is already in flight, returns a
    /// receiver that resolves with its final outcome. Otherwise registers
    /// this fingerprint as the one now in flight and returns `None`; the
    /// caller must call [`Self::finish`] with the same fingerprint once its
    /// own request reaches a terminal state.
    pub fn join_or_register(&self, fingerprint: Fingerprint) -> Option<broadcast::Receiver<RequestOutcomeRecord>> {
        let mut inflight = self.inflight.lock();
        if let Some(sender) = inflight.get(&fingerprint) {
            return Some(sender.subscribe());
        }
        let (tx, _rx) = broadcast::channel(1);
        inflight.insert(fingerprint, tx);
        None
    }

    /// Publishes the final outcome to every request that joined this
    /// fingerprint and removes it from the registry.
    pub fn finish(&self, fingerprint: &Fingerprint, outcome: RequestOutcomeRecord) {
        let sender = self.inflight.lock().remove(fingerprint);
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
    }
}
