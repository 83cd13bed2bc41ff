use std::path::PathBuf;
use std::sync::Arc;

use repl_config::Configuration;
use repl_controller::Controller;
use repl_messenger::{Transport, TcpTransport};
use repl_store::{DatabaseServices, MemDatabaseServices, PostgresDatabaseServices};
use repl_time::{SystemProvider, TimeProvider};
use repl_types::ControllerId;
use snafu::ResultExt;

use crate::error::{ControllerSnafu, Result, StoreSnafu, TopologySnafu};
use crate::topology::Topology;

/// Flags every subcommand needs to stand up its own `Controller`: where the
/// cluster topology lives, which store backend to talk to, and this
/// process's own identity. Each CLI invocation is a short-lived process
/// with its own `Controller`, the same way the source tool's command-line
/// utilities each open their own connection rather than going through a
/// shared daemon.
#[derive(Debug, Clone, clap::Args)]
pub struct ClusterArgs {
    /// Path to a JSON file describing workers, replica families, and
    /// databases.
    #[clap(long = "topology", env = "REPL_TOPOLOGY")]
    pub topology: PathBuf,

    /// Postgres connection string. When absent, an in-memory store is used
    /// (handy for local exercising of the CLI against a topology file with
    /// no durable state).
    #[clap(long = "database-url", env = "REPL_DATABASE_URL")]
    pub database_url: Option<String>,

    #[clap(long = "max-connections", default_value = "10")]
    pub max_connections: u32,

    #[clap(long = "controller-id", env = "REPL_CONTROLLER_ID", default_value = "1")]
    pub controller_id: u64,

    #[clap(long = "host", env = "REPL_HOST", default_value = "localhost")]
    pub host: String,
}

impl ClusterArgs {
    pub async fn configuration(&self) -> Result<Arc<Configuration>> {
        let config = Configuration::new();
        Topology::load(&self.topology).context(TopologySnafu)?.apply(&config).context(TopologySnafu)?;
        Ok(Arc::new(config))
    }

    pub async fn store(&self) -> Result<Arc<dyn DatabaseServices>> {
        match &self.database_url {
            Some(url) => {
                let store = PostgresDatabaseServices::connect(url, self.max_connections).await.context(StoreSnafu)?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(MemDatabaseServices::new())),
        }
    }

    pub fn transport(&self, config: Arc<Configuration>) -> Arc<dyn Transport> {
        Arc::new(TcpTransport::new(config))
    }

    pub fn time_provider(&self) -> Arc<dyn TimeProvider> {
        Arc::new(SystemProvider::new())
    }

    /// Registers this process's identity and builds the `Controller` every
    /// subcommand dispatches a single request or job through, along with
    /// the store and `Configuration` it shares with anything else the
    /// subcommand stands up (e.g. `Service`'s `IngestManager`, which must
    /// see the same store and worker set the `Controller` does).
    pub async fn controller(&self) -> Result<(Arc<Controller>, Arc<dyn DatabaseServices>)> {
        let config = self.configuration().await?;
        let store = self.store().await?;
        let transport = self.transport(Arc::clone(&config));
        let time_provider = self.time_provider();
        let controller = Controller::start(
            ControllerId::new(self.controller_id),
            self.host.clone(),
            config,
            Arc::clone(&store),
            transport,
            time_provider,
        )
        .await
        .context(ControllerSnafu)?;
        Ok((Arc::new(controller), store))
    }
}
