use std::net::SocketAddr;
use std::sync::Arc;

use observability_deps::tracing::info;
use repl_http::{AppState, AuthKeys};
use repl_ingest::{HttpLoader, IngestManager};
use snafu::ResultExt;

use crate::commands::runtime::ClusterArgs;
use crate::error::{HttpSnafu, Result};

/// Daemon mode: starts a `Controller` and an HTTP front-end in the same
/// process rather than splitting each role into its own binary.
#[derive(Debug, Clone, clap::Parser)]
pub struct Config {
    #[clap(flatten)]
    pub cluster: ClusterArgs,

    #[clap(long = "http-bind", env = "REPL_HTTP_BIND", default_value = "0.0.0.0:25080")]
    pub http_bind: SocketAddr,

    #[clap(long = "auth-key", env = "REPL_AUTH_KEY", default_value = "")]
    pub auth_key: String,

    #[clap(long = "admin-auth-key", env = "REPL_ADMIN_AUTH_KEY", default_value = "")]
    pub admin_auth_key: String,

    #[clap(long = "ingest-worker-pool-size", default_value = "4")]
    pub ingest_worker_pool_size: usize,
}

pub async fn command(config: Config) -> Result<()> {
    let (controller, store) = config.cluster.controller().await?;
    let time_provider = config.cluster.time_provider();
    let cluster_config = controller.config.clone();

    let ingest = IngestManager::start(
        store.clone(),
        cluster_config,
        Arc::new(HttpLoader::new()),
        time_provider,
        repl_backoff::BackoffConfig::default(),
        config.ingest_worker_pool_size,
    );

    let auth = AuthKeys::new(config.auth_key.clone(), config.admin_auth_key.clone());
    let state = AppState::new(controller.clone(), store, ingest, auth);
    let router = Arc::new(repl_http::build_router());

    info!(bind = %config.http_bind, "starting repl_cli service");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        controller.shutdown();
    };
    repl_http::serve(config.http_bind, state, router, shutdown).await.context(HttpSnafu)
}
