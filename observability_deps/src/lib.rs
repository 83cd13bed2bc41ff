//! Re-exports the tracing ecosystem crates used throughout the workspace so
//! every crate pins the same versions through one place.

pub use tracing;
