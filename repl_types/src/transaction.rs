use repl_time::Time;

use crate::{DatabaseName, TransactionId};

/// Lifecycle state of a bulk-ingest [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransactionState {
    IsStarting,
    Started,
    IsFinishing,
    Finished,
    IsAborting,
    Aborted,
    StartFailed,
    FinishFailed,
    AbortFailed,
}

impl TransactionState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Aborted | Self::StartFailed | Self::FinishFailed | Self::AbortFailed
        )
    }

    /// Whether a state machine may move from `self` to `next`. Used by
    /// `repl_store` to reject invalid transitions before they hit the
    /// database.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (IsStarting, Started)
                | (IsStarting, StartFailed)
                | (Started, IsFinishing)
                | (Started, IsAborting)
                | (IsFinishing, Finished)
                | (IsFinishing, FinishFailed)
                | (IsAborting, Aborted)
                | (IsAborting, AbortFailed)
        )
    }
}

/// A bulk-ingest epoch: rows contributed under this transaction are tagged
/// with its id; committing publishes them, aborting drops them via
/// partition pruning.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub database: DatabaseName,
    pub state: TransactionState,
    pub begin_time: Time,
    pub end_time: Option<Time>,
    pub context: String,
}

impl Transaction {
    pub fn is_started(&self) -> bool {
        self.state == TransactionState::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions_allowed() {
        assert!(TransactionState::IsStarting.can_transition_to(TransactionState::Started));
        assert!(TransactionState::Started.can_transition_to(TransactionState::IsFinishing));
        assert!(TransactionState::IsFinishing.can_transition_to(TransactionState::Finished));
    }

    #[test]
    fn skipping_states_rejected() {
        assert!(!TransactionState::IsStarting.can_transition_to(TransactionState::Finished));
        assert!(!TransactionState::Finished.can_transition_to(TransactionState::Started));
    }

    #[test]
    fn terminal_states_identified() {
        assert!(TransactionState::Finished.is_terminal());
        assert!(TransactionState::Aborted.is_terminal());
        assert!(!TransactionState::Started.is_terminal());
    }
}
