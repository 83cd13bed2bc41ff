#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! Wire framing and message schema for the binary protocol spoken to
//! replication workers: a 32-bit big-endian length prefix followed by a
//! `bincode`-encoded body, bounded by a hard per-message cap.

mod body;
mod codec;
mod header;

pub use body::*;
pub use codec::*;
pub use header::*;
