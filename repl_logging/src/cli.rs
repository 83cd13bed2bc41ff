use observability_deps::tracing::Level;

use crate::{init, Error, LogFormat};

/// Logging flags shared by every subcommand of `repl_cli`, flattened into
/// each subcommand's `clap::Parser` struct.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Log output format.
    #[clap(long = "log-format", env = "REPL_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// `tracing-subscriber` EnvFilter directives, e.g. `repl_job=debug,warn`.
    #[clap(long = "log-filter", env = "RUST_LOG", default_value = "")]
    pub log_filter: String,
}

impl LoggingConfig {
    pub fn init(&self) -> Result<(), Error> {
        let format = match self.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Logfmt => LogFormat::Logfmt,
            LogFormatArg::Json => LogFormat::Json,
        };
        init(format, &self.log_filter, Level::INFO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Logfmt,
    Json,
}
