use async_trait::async_trait;
use repl_types::{ChunkNumber, Dialect, TableName, Worker};

use crate::error::{IngestError, LoadFailedSnafu};

/// Hands one row-batch's worth of pre-parsed bytes to a worker for
/// `LOAD DATA INFILE`-style loading. Called once per safe point (a
/// row-batch boundary), so a cancellation observed between calls never
/// interrupts a load already in flight.
#[async_trait]
pub trait ContributionLoader: Send + Sync + std::fmt::Debug {
    async fn load(
        &self,
        worker: &Worker,
        table: &TableName,
        chunk: ChunkNumber,
        is_overlap: bool,
        dialect: &Dialect,
        batch: &[u8],
    ) -> Result<(), IngestError>;
}

/// Posts each batch to the worker's `http_loader` endpoint, the field
/// already carried on [`Worker`] for exactly this purpose.
#[derive(Debug)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContributionLoader for HttpLoader {
    async fn load(
        &self,
        worker: &Worker,
        table: &TableName,
        chunk: ChunkNumber,
        is_overlap: bool,
        dialect: &Dialect,
        batch: &[u8],
    ) -> Result<(), IngestError> {
        let url = format!("http://{}/ingest-data", worker.http_loader);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("table", table.as_str()),
                ("chunk", &chunk.get().to_string()),
                ("overlap", &is_overlap.to_string()),
                ("sql_options", &dialect.sql_options()),
            ])
            .body(batch.to_vec())
            .send()
            .await
            .map_err(|e| LoadFailedSnafu { message: e.to_string() }.build())?;
        response
            .error_for_status()
            .map_err(|e| LoadFailedSnafu { message: e.to_string() }.build())?;
        Ok(())
    }
}
