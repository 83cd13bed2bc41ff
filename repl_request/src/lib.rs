#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! One outbound worker operation per `Request`: `Created -> InProgress ->
//! Finished`, a single terminal callback firing exactly once, and
//! duplicate suppression keyed by worker-side fingerprint.

mod duplicate;
mod error;
mod kinds;
mod request;

pub use duplicate::{DuplicateRegistry, Fingerprint};
pub use error::*;
pub use kinds::*;
pub use request::*;
