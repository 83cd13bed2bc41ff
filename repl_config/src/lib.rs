#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! Typed, in-memory view over the cluster description, with a published
//! schema (category/param -> type/default/read-only/security-context) and
//! dedicated accessors for the structured sections: workers, database
//! families, and databases.
//!
//! Every "no input" signal here is `Option::None`, never a negative
//! sentinel or a magic default value.

mod config;
mod error;
mod schema;
mod value;

pub use config::*;
pub use error::*;
pub use schema::*;
pub use value::*;
