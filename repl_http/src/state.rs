use std::sync::Arc;

use repl_controller::Controller;
use repl_ingest::IngestManager;
use repl_store::DatabaseServices;

use crate::auth::AuthKeys;

/// Everything a handler needs: the single object a server binds its
/// routes against.
pub struct AppState {
    pub controller: Arc<Controller>,
    pub store: Arc<dyn DatabaseServices>,
    pub ingest: Arc<IngestManager>,
    pub auth: AuthKeys,
}

impl AppState {
    pub fn new(controller: Arc<Controller>, store: Arc<dyn DatabaseServices>, ingest: Arc<IngestManager>, auth: AuthKeys) -> Arc<Self> {
        Arc::new(Self { controller, store, ingest, auth })
    }
}
