use repl_time::Time;

use crate::{ChunkNumber, ContributionId, Dialect, TableName, TransactionId, WorkerName};

/// Terminal/in-flight status of one [`Contribution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ContributionStatus {
    InProgress,
    Finished,
    Cancelled,
    ReadFailed,
    LoadFailed,
}

impl ContributionStatus {
    /// `FINISHED`, `CANCELLED`, and `LOAD_FAILED` never transition again;
    /// `READ_FAILED` may transition back to `IN_PROGRESS` while retry budget
    /// remains.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::LoadFailed)
    }
}

/// One file-worth of rows being loaded into one table/chunk under one
/// transaction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub transaction_id: TransactionId,
    pub worker: WorkerName,
    pub table: TableName,
    pub chunk: ChunkNumber,
    pub is_overlap: bool,
    pub url: String,
    pub dialect: Dialect,
    pub status: ContributionStatus,
    pub num_bytes: u64,
    pub num_rows: u64,
    pub start_ms: Time,
    pub read_ms: u64,
    pub load_ms: u64,
    pub warnings: Vec<String>,
    pub retries: u32,
}

impl Contribution {
    /// Whether this contribution may still be retried from `READ_FAILED`.
    pub fn can_retry(&self, retry_budget: u32) -> bool {
        self.status == ContributionStatus::ReadFailed && self.retries < retry_budget
    }

    /// Applies a state transition, enforcing monotonicity: once terminal,
    /// a contribution's status never changes again.
    pub fn transition_to(&mut self, next: ContributionStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal { from: self.status });
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, snafu::Snafu, PartialEq, Eq)]
pub enum TransitionError {
    #[snafu(display("contribution is already in terminal status {from:?}"))]
    AlreadyTerminal { from: ContributionStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(status: ContributionStatus, retries: u32) -> Contribution {
        Contribution {
            id: ContributionId::new(1),
            transaction_id: TransactionId::new(1),
            worker: "w1".into(),
            table: "Object".into(),
            chunk: ChunkNumber::new(7),
            is_overlap: false,
            url: "file:///tmp/x.csv".into(),
            dialect: Dialect::default(),
            status,
            num_bytes: 0,
            num_rows: 0,
            start_ms: Time::from_millis(0),
            read_ms: 0,
            load_ms: 0,
            warnings: vec![],
            retries,
        }
    }

    #[test]
    fn read_failed_can_retry_within_budget() {
        let c = contribution(ContributionStatus::ReadFailed, 1);
        assert!(c.can_retry(3));
        let exhausted = contribution(ContributionStatus::ReadFailed, 3);
        assert!(!exhausted.can_retry(3));
    }

    #[test]
    fn terminal_status_rejects_further_transitions() {
        let mut c = contribution(ContributionStatus::Finished, 0);
        assert_eq!(
            c.transition_to(ContributionStatus::InProgress),
            Err(TransitionError::AlreadyTerminal { from: ContributionStatus::Finished })
        );
    }

    #[test]
    fn read_failed_is_not_terminal_and_can_transition() {
        let mut c = contribution(ContributionStatus::ReadFailed, 0);
        assert!(c.transition_to(ContributionStatus::InProgress).is_ok());
        assert_eq!(c.status, ContributionStatus::InProgress);
    }
}
