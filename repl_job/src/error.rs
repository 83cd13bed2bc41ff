use repl_store::StoreError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum JobError {
    #[snafu(display("store error: {source}"))]
    Store { source: StoreError },
}

impl From<StoreError> for JobError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

pub type Result<T, E = JobError> = std::result::Result<T, E>;
