#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations)]

//! Test-only utilities shared by every crate's `#[cfg(test)]` modules.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static LOG_SETUP: Once = Once::new();

/// Initializes a `tracing-subscriber` pipeline the first time it's called
/// in a test binary; subsequent calls are no-ops. Controlled by the
/// `LOG_FILTER` env var (defaults to `warn`).
pub fn maybe_start_logging() {
    LOG_SETUP.call_once(|| {
        let filter = EnvFilter::try_from_env("LOG_FILTER").unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A `tempfile::TempDir` wrapper so call sites don't need the `tempfile`
/// dependency directly.
pub fn tmp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

#[cfg(feature = "future_timeout")]
pub mod timeout {
    use std::time::Duration;

    /// Extension trait bounding how long a test will wait on a future
    /// before failing, instead of hanging the test suite.
    #[async_trait::async_trait]
    pub trait FutureTimeout: std::future::Future + Sized + Send
    where
        Self::Output: Send,
    {
        async fn with_timeout(self, d: Duration) -> Self::Output {
            tokio::time::timeout(d, self)
                .await
                .expect("future did not complete within timeout")
        }
    }

    impl<F> FutureTimeout for F
    where
        F: std::future::Future + Send,
        F::Output: Send,
    {
    }
}
