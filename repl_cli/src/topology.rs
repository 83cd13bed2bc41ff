use std::path::Path;

use repl_config::Configuration;
use repl_types::{Database, DatabaseFamily, Worker};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};

/// On-disk description of a cluster: workers, replica families, and the
/// databases within them. `Configuration` itself has no file-loading
/// capability, only the programmatic `add_worker`/`add_family`/
/// `add_database` calls this type drives.
#[derive(Debug, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub workers: Vec<Worker>,
    #[serde(default)]
    pub families: Vec<DatabaseFamily>,
    #[serde(default)]
    pub databases: Vec<Database>,
}

#[derive(Debug, Snafu)]
pub enum TopologyError {
    #[snafu(display("reading topology file {path}: {source}"))]
    Read { path: String, source: std::io::Error },

    #[snafu(display("parsing topology file {path}: {source}"))]
    Parse { path: String, source: serde_json::Error },

    #[snafu(display("applying topology to configuration: {source}"))]
    Apply { source: repl_config::ConfigError },
}

impl Topology {
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let raw = std::fs::read_to_string(path).context(ReadSnafu { path: path.display().to_string() })?;
        serde_json::from_str(&raw).context(ParseSnafu { path: path.display().to_string() })
    }

    /// Registers every worker, family, and database in order, so a
    /// database's family reference always resolves.
    pub fn apply(self, config: &Configuration) -> Result<(), TopologyError> {
        for worker in self.workers {
            config.add_worker(worker).context(ApplySnafu)?;
        }
        for family in self.families {
            config.add_family(family).context(ApplySnafu)?;
        }
        for database in self.databases {
            config.add_database(database).context(ApplySnafu)?;
        }
        Ok(())
    }
}
