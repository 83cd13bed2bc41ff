use repl_store::StoreError;
use repl_types::JobType;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum ControllerError {
    #[snafu(display("store error: {source}"))]
    Store { source: StoreError },

    #[snafu(display("job family {job_type:?} is busy and the submitted job is not preemptive"))]
    FamilyBusy { job_type: JobType },
}

impl From<StoreError> for ControllerError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;
