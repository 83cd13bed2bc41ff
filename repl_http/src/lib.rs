#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! JSON-over-HTTP front-end translating external calls into
//! `repl_controller`/`repl_ingest` operations, in the representative-route
//! envelope format every response shares.

mod auth;
mod body;
mod envelope;
mod error;
mod handlers;
mod router;
mod server;
mod state;

pub use auth::{AuthKeys, AuthTier};
pub use error::HttpError;
pub use server::serve;
pub use state::AppState;

use http::Method;

pub use router::Router;

/// Builds the route table every server binds against. Grouped by surface:
/// ingest (spec's full 6-route file-ingest surface), replication (one
/// representative Controller job-submission route), qserv (read-only
/// replica snapshots), and health.
pub fn build_router() -> Router {
    let mut router = Router::new();
    router
        .route(Method::POST, "/ingest/file", AuthTier::Required, handlers::ingest::ingest_file_sync)
        .route(Method::POST, "/ingest/file-async", AuthTier::Required, handlers::ingest::ingest_file_async)
        .route(Method::GET, "/ingest/file-async/:id", AuthTier::Required, handlers::ingest::get_contribution)
        .route(Method::DELETE, "/ingest/file-async/:id", AuthTier::Required, handlers::ingest::cancel_contribution)
        .route(
            Method::GET,
            "/ingest/file-async/trans/:id",
            AuthTier::Required,
            handlers::ingest::list_transaction_contributions,
        )
        .route(
            Method::DELETE,
            "/ingest/file-async/trans/:id",
            AuthTier::Required,
            handlers::ingest::cancel_transaction_contributions,
        )
        .route(Method::POST, "/replication/replicate", AuthTier::Admin, handlers::replication::replicate)
        .route(Method::GET, "/replicas/:database", AuthTier::Required, handlers::qserv::find_replicas)
        .route(Method::GET, "/workers/:worker/replicas/:database", AuthTier::Required, handlers::qserv::find_worker_replicas)
        .route(Method::GET, "/health", AuthTier::None, handlers::health::health);
    router
}
