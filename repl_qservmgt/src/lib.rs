#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! Parallel hierarchy to `repl_request` targeting the query-engine workers
//! (not the replication workers) over a JSON transport. Same framing
//! (`repl_proto::RequestHeader`/`ResponseHeader`), same state machine
//! shape, bodies are JSON rather than bincode.

mod error;
mod kinds;
mod request;

pub use error::*;
pub use kinds::*;
pub use request::*;
