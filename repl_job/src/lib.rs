mod behavior;
mod dispatch;
mod error;
mod job;
mod jobs;

pub use behavior::*;
pub use dispatch::*;
pub use error::*;
pub use job::*;
pub use jobs::*;
