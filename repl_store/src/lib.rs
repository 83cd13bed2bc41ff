#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

//! The durable store: the sole entry point for state that must survive a
//! process restart (controllers, jobs, requests, replicas, transactions,
//! contributions). [`DatabaseServices`] is the trait every other component
//! programs against; [`mem::MemDatabaseServices`] and
//! [`postgres::PostgresDatabaseServices`] are its two implementations.

mod error;
mod interface;
mod mem;
mod postgres;

pub use error::*;
pub use interface::*;
pub use mem::MemDatabaseServices;
pub use postgres::PostgresDatabaseServices;
