use std::sync::Arc;

use repl_csv::CsvParser;
use repl_types::{Contribution, Worker};
use tokio_util::sync::CancellationToken;

use crate::error::{IngestError, ReadFailedSnafu};
use crate::loader::ContributionLoader;
use crate::reader;

/// Rows accumulated before a batch is handed to the loader, the "row batch
/// boundary" safe point cancellation is checked at.
const BATCH_ROWS: usize = 1_000;

#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineStats {
    pub num_bytes: u64,
    pub num_rows: u64,
}

/// Runs one contribution's read-parse-load pipeline to completion, failure,
/// or cancellation. Read errors are distinguished from load errors so the
/// caller can apply the right terminal status.
pub async fn run(
    contribution: &Contribution,
    worker: &Worker,
    loader: &Arc<dyn ContributionLoader>,
    cancel: &CancellationToken,
) -> Result<PipelineStats, IngestError> {
    let mut source = reader::open(&contribution.url).await?;
    let mut parser = CsvParser::new(contribution.dialect);
    let mut stats = PipelineStats::default();
    let mut batch = Vec::new();
    let mut rows_in_batch = 0usize;

    loop {
        let chunk = source.next_chunk().await?;
        let flush = chunk.is_none();
        let bytes = chunk.as_deref().unwrap_or(&[]);
        stats.num_bytes += bytes.len() as u64;

        parser
            .parse(bytes, flush, |line| {
                batch.extend_from_slice(line);
                batch.push(contribution.dialect.lines_terminated_by);
                rows_in_batch += 1;
            })
            .map_err(|e| ReadFailedSnafu { message: e.to_string() }.build())?;

        if rows_in_batch >= BATCH_ROWS || flush {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            if !batch.is_empty() {
                load_batch(contribution, worker, loader, &mut batch, &mut stats).await?;
            }
            rows_in_batch = 0;
        }

        if flush {
            break;
        }
    }

    Ok(stats)
}

async fn load_batch(
    contribution: &Contribution,
    worker: &Worker,
    loader: &Arc<dyn ContributionLoader>,
    batch: &mut Vec<u8>,
    stats: &mut PipelineStats,
) -> Result<(), IngestError> {
    loader
        .load(
            worker,
            &contribution.table,
            contribution.chunk,
            contribution.is_overlap,
            &contribution.dialect,
            batch,
        )
        .await?;
    stats.num_rows += row_count(batch, contribution.dialect.lines_terminated_by);
    batch.clear();
    Ok(())
}

fn row_count(batch: &[u8], terminator: u8) -> u64 {
    batch.iter().filter(|&&b| b == terminator).count() as u64
}
