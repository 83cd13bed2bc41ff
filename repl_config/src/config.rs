use std::collections::HashMap;

use observability_deps::tracing::{debug, info};
use parking_lot::RwLock;
use repl_types::{Database, DatabaseFamily, DatabaseName, FamilyName, Worker, WorkerName};
use tokio::sync::watch;

use crate::{
    error::{ConfigError, EmptyNotAllowedSnafu, ReadOnlySnafu, UnknownParamSnafu, WrongTypeSnafu},
    schema::{self, ParamDefault},
    value::{ConfigScalar, ConfigValue},
};

/// Monotonically increasing version stamped on every successful mutation.
/// Subscribers compare this against their last-seen value rather than
/// diffing documents.
pub type ConfigVersion = u64;

#[derive(Debug, Default)]
struct Document {
    params: HashMap<(&'static str, &'static str), ConfigScalar>,
    workers: HashMap<WorkerName, Worker>,
    families: HashMap<FamilyName, DatabaseFamily>,
    databases: HashMap<DatabaseName, Database>,
}

/// The live, validated view of the cluster description.
///
/// Holds the document behind a [`parking_lot::RwLock`] rather than behind a
/// global singleton: every component that needs configuration is handed an
/// `Arc<Configuration>` explicitly at construction. Every successful
/// mutation bumps [`ConfigVersion`] and is broadcast on a `watch` channel so
/// long-lived tasks (the controller's scheduler loop, the messenger's
/// per-worker queues) can react to a worker being disabled or a parameter
/// changing without polling.
#[derive(Debug)]
pub struct Configuration {
    doc: RwLock<Document>,
    version_tx: watch::Sender<ConfigVersion>,
}

impl Configuration {
    /// Builds a configuration pre-populated with schema defaults and no
    /// workers/families/databases.
    pub fn new() -> Self {
        let mut params = HashMap::new();
        for spec in schema::SCHEMA {
            params.insert((spec.category, spec.name), ConfigScalar::from(spec.default));
        }
        let (version_tx, _) = watch::channel(0);
        Self {
            doc: RwLock::new(Document {
                params,
                workers: HashMap::new(),
                families: HashMap::new(),
                databases: HashMap::new(),
            }),
            version_tx,
        }
    }

    /// Subscribes to version bumps. The initial value observed by a fresh
    /// receiver is the version at subscription time, not 0.
    pub fn watch_version(&self) -> watch::Receiver<ConfigVersion> {
        self.version_tx.subscribe()
    }

    fn bump_version(&self) {
        self.version_tx.send_modify(|v| *v += 1);
    }

    pub fn get<T: ConfigValue>(&self, category: &str, name: &str) -> Result<T, ConfigError> {
        let spec = schema::find(category, name).context_or(category, name)?;
        let doc = self.doc.read();
        let scalar = doc
            .params
            .get(&(spec.category, spec.name))
            .expect("schema params are populated for every SCHEMA entry at construction");
        T::from_scalar(scalar).ok_or_else(|| {
            WrongTypeSnafu {
                category: category.to_string(),
                name: name.to_string(),
                expected: scalar.type_name(),
                actual: "<requested type>",
            }
            .build()
        })
    }

    pub fn set<T: ConfigValue>(&self, category: &str, name: &str, value: T) -> Result<ConfigVersion, ConfigError> {
        let spec = schema::find(category, name).context_or(category, name)?;
        if spec.read_only {
            return ReadOnlySnafu {
                category: category.to_string(),
                name: name.to_string(),
            }
            .fail();
        }
        let scalar = value.into_scalar();
        if scalar.is_empty() && !spec.empty_allowed {
            return EmptyNotAllowedSnafu {
                category: category.to_string(),
                name: name.to_string(),
            }
            .fail();
        }
        {
            let mut doc = self.doc.write();
            doc.params.insert((spec.category, spec.name), scalar);
        }
        self.bump_version();
        debug!(category, name, "configuration parameter updated");
        Ok(*self.version_tx.borrow())
    }

    pub fn worker(&self, name: &WorkerName) -> Option<Worker> {
        self.doc.read().workers.get(name).cloned()
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.doc.read().workers.values().cloned().collect()
    }

    pub fn add_worker(&self, worker: Worker) -> Result<ConfigVersion, ConfigError> {
        let mut doc = self.doc.write();
        if doc.workers.contains_key(&worker.name) {
            return Err(ConfigError::referential(format!(
                "worker '{}' already exists",
                worker.name
            )));
        }
        let name = worker.name.clone();
        doc.workers.insert(worker.name.clone(), worker);
        drop(doc);
        self.bump_version();
        info!(worker = %name, "worker registered");
        Ok(*self.version_tx.borrow())
    }

    pub fn update_worker(&self, worker: Worker) -> Result<ConfigVersion, ConfigError> {
        let mut doc = self.doc.write();
        if !doc.workers.contains_key(&worker.name) {
            return Err(ConfigError::referential(format!(
                "worker '{}' does not exist",
                worker.name
            )));
        }
        doc.workers.insert(worker.name.clone(), worker);
        drop(doc);
        self.bump_version();
        Ok(*self.version_tx.borrow())
    }

    /// Fails referentially if any known database still names this worker
    /// in a replica (that check lives with `DatabaseServices`, which is the
    /// only component that knows replica placement; here we only refuse to
    /// delete a worker that does not exist).
    pub fn delete_worker(&self, name: &WorkerName) -> Result<ConfigVersion, ConfigError> {
        let mut doc = self.doc.write();
        if doc.workers.remove(name).is_none() {
            return Err(ConfigError::referential(format!("worker '{name}' does not exist")));
        }
        drop(doc);
        self.bump_version();
        Ok(*self.version_tx.borrow())
    }

    pub fn family(&self, name: &FamilyName) -> Option<DatabaseFamily> {
        self.doc.read().families.get(name).cloned()
    }

    pub fn families(&self) -> Vec<DatabaseFamily> {
        self.doc.read().families.values().cloned().collect()
    }

    pub fn add_family(&self, family: DatabaseFamily) -> Result<ConfigVersion, ConfigError> {
        family
            .validate()
            .map_err(|e| ConfigError::referential(e.to_string()))?;
        let mut doc = self.doc.write();
        if doc.families.contains_key(&family.name) {
            return Err(ConfigError::referential(format!(
                "family '{}' already exists",
                family.name
            )));
        }
        doc.families.insert(family.name.clone(), family);
        drop(doc);
        self.bump_version();
        Ok(*self.version_tx.borrow())
    }

    pub fn database(&self, name: &DatabaseName) -> Option<Database> {
        self.doc.read().databases.get(name).cloned()
    }

    pub fn databases_in_family(&self, family: &FamilyName) -> Vec<Database> {
        self.doc
            .read()
            .databases
            .values()
            .filter(|d| &d.family == family)
            .cloned()
            .collect()
    }

    /// Adding a database requires its family to already be registered; this
    /// is the referential half of validation that `Database::validate`
    /// cannot perform on its own (it only sees the family name, not the
    /// live family table).
    pub fn add_database(&self, database: Database) -> Result<ConfigVersion, ConfigError> {
        database
            .validate()
            .map_err(|e| ConfigError::referential(e.to_string()))?;
        let mut doc = self.doc.write();
        if !doc.families.contains_key(&database.family) {
            return Err(ConfigError::referential(format!(
                "database '{}' names unknown family '{}'",
                database.name, database.family
            )));
        }
        if doc.databases.contains_key(&database.name) {
            return Err(ConfigError::referential(format!(
                "database '{}' already exists",
                database.name
            )));
        }
        doc.databases.insert(database.name.clone(), database);
        drop(doc);
        self.bump_version();
        Ok(*self.version_tx.borrow())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts `schema::find`'s `Option` into the `UnknownParam` error, local
/// to this module so `get`/`set` read as a single `?` chain.
trait FindExt {
    fn context_or(self, category: &str, name: &str) -> Result<&'static schema::ParamSpec, ConfigError>;
}

impl FindExt for Option<&'static schema::ParamSpec> {
    fn context_or(self, category: &str, name: &str) -> Result<&'static schema::ParamSpec, ConfigError> {
        self.ok_or_else(|| {
            UnknownParamSnafu {
                category: category.to_string(),
                name: name.to_string(),
            }
            .build()
        })
    }
}
