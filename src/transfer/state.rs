//! Transfer Attempt State Definitions
//!
//! One call to the executor walks this state machine:
//!
//! ```text
//! STARTED → VALIDATED → COMMITTED → RECORDED → DONE
//!    ↓          ↓           ↓
//! REJECTED  CONFLICTED  (record write failed: surfaced, balances stay)
//! NOT_FOUND
//! ```
//!
//! COMMITTED means debit and credit were applied as one unit. There is no
//! debit-only state.

use std::fmt;

/// Phase of a single transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPhase {
    /// Request accepted, accounts not yet loaded
    Started,

    /// Both snapshots loaded and all preconditions hold
    Validated,

    /// Debit and credit committed atomically
    Committed,

    /// Transfer record persisted
    Recorded,

    /// Terminal: transfer completed and returned to the caller
    Done,

    /// Terminal: a precondition failed, nothing mutated
    Rejected,

    /// Terminal: version conflict at commit, nothing mutated
    Conflicted,

    /// Terminal: an account does not exist, nothing mutated
    NotFound,
}

impl TransferPhase {
    /// Check if this is a terminal phase
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferPhase::Done
                | TransferPhase::Rejected
                | TransferPhase::Conflicted
                | TransferPhase::NotFound
        )
    }

    /// Whether balances have been changed by the time this phase is reached
    #[inline]
    pub fn has_committed_balances(&self) -> bool {
        matches!(
            self,
            TransferPhase::Committed | TransferPhase::Recorded | TransferPhase::Done
        )
    }

    /// Legal forward edges of the attempt state machine
    pub fn can_transition_to(&self, next: TransferPhase) -> bool {
        use TransferPhase::*;
        matches!(
            (self, next),
            (Started, Validated)
                | (Started, Rejected)
                | (Started, NotFound)
                | (Validated, Committed)
                | (Validated, Conflicted)
                | (Validated, NotFound)
                | (Committed, Recorded)
                | (Recorded, Done)
        )
    }

    /// Get human-readable phase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Started => "STARTED",
            TransferPhase::Validated => "VALIDATED",
            TransferPhase::Committed => "COMMITTED",
            TransferPhase::Recorded => "RECORDED",
            TransferPhase::Done => "DONE",
            TransferPhase::Rejected => "REJECTED",
            TransferPhase::Conflicted => "CONFLICTED",
            TransferPhase::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(TransferPhase::Done.is_terminal());
        assert!(TransferPhase::Rejected.is_terminal());
        assert!(TransferPhase::Conflicted.is_terminal());
        assert!(TransferPhase::NotFound.is_terminal());

        assert!(!TransferPhase::Started.is_terminal());
        assert!(!TransferPhase::Validated.is_terminal());
        assert!(!TransferPhase::Committed.is_terminal());
        assert!(!TransferPhase::Recorded.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            TransferPhase::Started,
            TransferPhase::Validated,
            TransferPhase::Committed,
            TransferPhase::Recorded,
            TransferPhase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_exit_after_commit() {
        // Once balances are committed the attempt cannot end as rejected or conflicted
        assert!(!TransferPhase::Committed.can_transition_to(TransferPhase::Conflicted));
        assert!(!TransferPhase::Committed.can_transition_to(TransferPhase::Rejected));
        assert!(!TransferPhase::Recorded.can_transition_to(TransferPhase::NotFound));
        assert!(!TransferPhase::Validated.can_transition_to(TransferPhase::Rejected));
    }

    #[test]
    fn test_committed_balances() {
        assert!(TransferPhase::Committed.has_committed_balances());
        assert!(TransferPhase::Done.has_committed_balances());
        assert!(!TransferPhase::Conflicted.has_committed_balances());
        assert!(!TransferPhase::Validated.has_committed_balances());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferPhase::Started.to_string(), "STARTED");
        assert_eq!(TransferPhase::NotFound.to_string(), "NOT_FOUND");
    }
}
