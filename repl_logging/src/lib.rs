#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations)]

//! The logging pipeline shared by `repl_cli`'s `run` subcommand and by every
//! binary in the workspace: a `tracing-subscriber` layer selected by
//! [`LogFormat`] and filtered by an `EnvFilter` built from `RUST_LOG`.

#[cfg(feature = "clap")]
pub mod cli;

use observability_deps::tracing::{self, Level};
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, colorized when stdout is a terminal.
    #[default]
    Pretty,
    /// `key=value` pairs, one per line — convenient for log aggregators
    /// that don't parse JSON.
    Logfmt,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Installs the process-wide tracing subscriber. Must be called at most
/// once; subsequent calls return [`Error::AlreadyInitialized`].
pub fn init(format: LogFormat, filter_directives: &str, default_level: Level) -> Result<(), Error> {
    let filter = EnvFilter::try_new(filter_directives)
        .or_else(|_| EnvFilter::try_new(default_level.to_string()))?;

    let result = match format {
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
        LogFormat::Logfmt => fmt()
            .with_env_filter(filter)
            .event_format(LogfmtFormatter)
            .try_init(),
        LogFormat::Json => fmt().with_env_filter(filter).json().try_init(),
    };
    result.map_err(|_| Error::AlreadyInitialized)
}

/// A minimal `key=value` event formatter (the `logfmt` convention), kept
/// in this crate since it has no other consumers.
struct LogfmtFormatter;

impl<S, N> fmt::FormatEvent<S, N> for LogfmtFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        write!(writer, "level={} target={} ", metadata.level(), metadata.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
