#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! Process-wide façade: owns the Messenger, the store handle, the
//! Configuration snapshot, and this process's registered identity.
//! Every Request and Job is attached to exactly one Controller, which
//! enforces exclusive/preemptive Job admission per family and propagates
//! cancellation on shutdown.

mod admission;
mod controller;
mod error;

pub use controller::Controller;
pub use error::*;
