#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! Storage-agnostic data model for the replication & ingest control plane:
//! [`Worker`], [`DatabaseFamily`]/[`Database`]/[`Table`], [`Replica`],
//! [`Transaction`], [`Contribution`], and the id/state types shared by
//! [`Request`](crate::request::Request) and [`Job`](crate::job::Job).
//!
//! This crate has no SQL dependency; `repl_store` maps these types onto rows.

mod contribution;
mod dialect;
mod ids;
mod job;
mod replica;
mod request;
mod schema;
mod transaction;
mod worker;

pub use contribution::*;
pub use dialect::*;
pub use ids::*;
pub use job::*;
pub use replica::*;
pub use request::*;
pub use schema::*;
pub use transaction::*;
pub use worker::*;
