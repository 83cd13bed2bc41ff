use repl_time::Time;

use crate::{ControllerId, JobId};

/// A fan-out control-plane operation's kind, used for admission policy
/// (exclusive/preemptive scheduling per family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum JobType {
    FindAll,
    Replicate,
    Purge,
    Move,
    Rebalance,
    ClusterHealth,
    QservSync,
    QservStatus,
    Sql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JobState {
    Created,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JobExtendedState {
    None,
    Success,
    Failed,
    Cancelled,
    ConfigError,
    Expired,
}

/// Storage-agnostic envelope for a [`crate::JobType`] fan-out. Forms a tree
/// via `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: JobType,
    pub parent_id: Option<JobId>,
    pub controller_id: ControllerId,
    pub state: JobState,
    pub extended_state: JobExtendedState,
    pub priority: i32,
    pub exclusive: bool,
    pub preemptive: bool,
    pub begin_time: Option<Time>,
    pub end_time: Option<Time>,
    pub heartbeat_time: Time,
}

impl JobRecord {
    pub fn is_finished(&self) -> bool {
        self.state == JobState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_created_job_is_not_finished() {
        let job = JobRecord {
            id: JobId::new(1),
            job_type: JobType::Replicate,
            parent_id: None,
            controller_id: ControllerId::new(1),
            state: JobState::Created,
            extended_state: JobExtendedState::None,
            priority: 0,
            exclusive: false,
            preemptive: false,
            begin_time: None,
            end_time: None,
            heartbeat_time: Time::from_millis(0),
        };
        assert!(!job.is_finished());
    }
}
