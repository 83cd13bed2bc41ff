#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! One ordered outbound queue per worker: `Messenger` is the single point
//! every `Request`/`QservMgtRequest` goes through to reach a worker.
//! Ordering is strict FIFO per worker; priority only reorders items still
//! waiting in the queue, never an in-flight send.

mod error;
mod messenger;
mod tcp;
mod transport;
mod worker_queue;

pub use error::*;
pub use messenger::*;
pub use tcp::TcpTransport;
pub use transport::*;
