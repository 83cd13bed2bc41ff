#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! Streaming line scanner over a worker's ingest dialect. Splits byte
//! chunks into complete lines, honoring escape pairs across chunk
//! boundaries, under a hard per-row length cap.

mod error;
mod parser;

pub use error::CsvError;
pub use parser::{CsvParser, DEFAULT_MAX_ROW_LEN};
