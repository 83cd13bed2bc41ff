use snafu::Snafu;

/// Errors raised by [`crate::Configuration`]: schema violations (unknown
/// parameter, wrong type, read-only, empty not allowed) and referential
/// violations (a mutation that would leave the document inconsistent,
/// e.g. deleting a worker still holding replicas).
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("unknown configuration parameter '{category}'.'{name}'"))]
    UnknownParam { category: String, name: String },

    #[snafu(display("parameter '{category}'.'{name}' is read-only after initialization"))]
    ReadOnly { category: String, name: String },

    #[snafu(display("parameter '{category}'.'{name}' expected type {expected}, got {actual}"))]
    WrongType {
        category: String,
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[snafu(display("parameter '{category}'.'{name}' does not allow an empty/zero value"))]
    EmptyNotAllowed { category: String, name: String },

    #[snafu(display("referential violation: {message}"))]
    Referential { message: String },
}

impl ConfigError {
    pub fn referential(message: impl Into<String>) -> Self {
        Self::Referential { message: message.into() }
    }
}
