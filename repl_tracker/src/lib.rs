#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

//! Cross-cutting concurrency primitives shared by the store, messenger,
//! request, and job layers.

mod id;
mod named_mutex;
mod task;

pub use id::*;
pub use named_mutex::*;
pub use task::*;
