use crate::ConfigScalar;

/// Describes one `(category, param)` slot of the configuration document:
/// its default, whether it's read-only after process start, whether it
/// carries a security context (redacted from logs), and whether an
/// empty/zero value is admissible.
///
/// Expressed as a Rust `const` table built once at startup instead of a
/// singleton registry populated from a static JSON blob.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub category: &'static str,
    pub name: &'static str,
    pub read_only: bool,
    pub security_context: bool,
    pub empty_allowed: bool,
    pub default: ParamDefault,
}

/// A `const`-constructible default value (the public `ConfigScalar` isn't
/// `const`-friendly because of its owned `String` variant).
#[derive(Debug, Clone, Copy)]
pub enum ParamDefault {
    U32(u32),
    U64(u64),
    Bool(bool),
    Str(&'static str),
}

impl From<ParamDefault> for ConfigScalar {
    fn from(d: ParamDefault) -> Self {
        match d {
            ParamDefault::U32(v) => ConfigScalar::U32(v),
            ParamDefault::U64(v) => ConfigScalar::U64(v),
            ParamDefault::Bool(v) => ConfigScalar::Bool(v),
            ParamDefault::Str(v) => ConfigScalar::String(v.to_string()),
        }
    }
}

/// The built-in parameter table. New parameters are added here, never as a
/// side effect of some other startup path.
pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec {
        category: "common",
        name: "request_timeout_sec",
        read_only: false,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::U32(300),
    },
    ParamSpec {
        category: "common",
        name: "heartbeat_interval_sec",
        read_only: false,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::U32(10),
    },
    ParamSpec {
        category: "controller",
        name: "num_threads",
        read_only: true,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::U32(4),
    },
    ParamSpec {
        category: "controller",
        name: "http_server_port",
        read_only: true,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::U32(25080),
    },
    ParamSpec {
        category: "controller",
        name: "auth_key",
        read_only: false,
        security_context: true,
        empty_allowed: true,
        default: ParamDefault::Str(""),
    },
    ParamSpec {
        category: "controller",
        name: "admin_auth_key",
        read_only: false,
        security_context: true,
        empty_allowed: true,
        default: ParamDefault::Str(""),
    },
    ParamSpec {
        category: "database",
        name: "qserv_master_database",
        read_only: true,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::Str("qservMeta"),
    },
    ParamSpec {
        category: "xrootd",
        name: "auto_notify",
        read_only: false,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::Bool(true),
    },
    ParamSpec {
        category: "ingest",
        name: "max_retries",
        read_only: false,
        security_context: false,
        empty_allowed: true,
        default: ParamDefault::U32(3),
    },
    ParamSpec {
        category: "ingest",
        name: "num_concurrent_workers",
        read_only: false,
        security_context: false,
        empty_allowed: false,
        default: ParamDefault::U32(8),
    },
    ParamSpec {
        category: "ingest",
        name: "retriable_error_codes",
        read_only: false,
        security_context: false,
        empty_allowed: true,
        default: ParamDefault::Str("ECONNRESET,ETIMEDOUT"),
    },
];

pub fn find(category: &str, name: &str) -> Option<&'static ParamSpec> {
    SCHEMA.iter().find(|p| p.category == category && p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_parameter() {
        let spec = find("common", "request_timeout_sec").unwrap();
        assert!(!spec.read_only);
    }

    #[test]
    fn unknown_parameter_not_found() {
        assert!(find("common", "does_not_exist").is_none());
    }
}
