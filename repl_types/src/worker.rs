use crate::WorkerName;

/// `host:port` pair for one of a worker's service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for HostPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A node that owns chunk data and serves replication and query traffic.
///
/// `name` is unique and immutable for the life of the worker; host/port
/// fields are mutable but changed rarely. Workers are owned by
/// [`crate::Configuration`](../repl_config/struct.Configuration.html); every
/// other component holds them by [`WorkerName`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Worker {
    pub name: WorkerName,
    pub enabled: bool,
    pub read_only: bool,
    pub svc: HostPort,
    pub fs: HostPort,
    pub data_dir: String,
    pub loader: HostPort,
    pub loader_tmp_dir: String,
    pub exporter: HostPort,
    pub exporter_tmp_dir: String,
    pub http_loader: HostPort,
    pub http_loader_tmp_dir: String,
}

impl Worker {
    /// A worker is eligible to host a "good" replica iff it is enabled.
    /// Disabled workers may still carry replica rows (not yet purged), but
    /// those rows do not count toward `min_replicas`/`max_replicas`.
    pub fn is_replication_target(&self) -> bool {
        self.enabled && !self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(name: &str, enabled: bool) -> Worker {
        Worker {
            name: WorkerName::from(name),
            enabled,
            read_only: false,
            svc: HostPort::new("localhost", 25000),
            fs: HostPort::new("localhost", 25001),
            data_dir: "/data".into(),
            loader: HostPort::new("localhost", 25002),
            loader_tmp_dir: "/tmp/loader".into(),
            exporter: HostPort::new("localhost", 25003),
            exporter_tmp_dir: "/tmp/exporter".into(),
            http_loader: HostPort::new("localhost", 25004),
            http_loader_tmp_dir: "/tmp/http_loader".into(),
        }
    }

    #[test]
    fn disabled_worker_is_not_a_replication_target() {
        assert!(worker("w1", true).is_replication_target());
        assert!(!worker("w1", false).is_replication_target());
    }
}
