use std::fmt;

use serde::Serialize;

/// Lifecycle status of an iteration, a client, a round or a whole plan.
///
/// Statuses are merged by severity: the higher rank wins and equal ranks keep
/// the value that was there first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    NotStarted,
    Scheduled,
    Ongoing,
    OngoingScheduled,
    PartiallySkipped,
    Success,
    Skipped,
    Failed,
    Cancelled,
    Terminated,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            ExecutionStatus::NotStarted => 0,
            ExecutionStatus::Scheduled => 1,
            ExecutionStatus::Ongoing
            | ExecutionStatus::OngoingScheduled
            | ExecutionStatus::PartiallySkipped => 2,
            ExecutionStatus::Success | ExecutionStatus::Skipped => 3,
            ExecutionStatus::Failed => 4,
            ExecutionStatus::Cancelled => 5,
            ExecutionStatus::Terminated => 6,
        }
    }

    #[must_use]
    pub const fn merge(self, other: ExecutionStatus) -> ExecutionStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.rank() >= ExecutionStatus::Success.rank()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::NotStarted => "not_started",
            ExecutionStatus::Scheduled => "scheduled",
            ExecutionStatus::Ongoing => "ongoing",
            ExecutionStatus::OngoingScheduled => "ongoing_scheduled",
            ExecutionStatus::PartiallySkipped => "partially_skipped",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::Terminated => "terminated",
        }
    }

    pub(crate) const fn to_index(self) -> u8 {
        match self {
            ExecutionStatus::NotStarted => 0,
            ExecutionStatus::Scheduled => 1,
            ExecutionStatus::Ongoing => 2,
            ExecutionStatus::OngoingScheduled => 3,
            ExecutionStatus::PartiallySkipped => 4,
            ExecutionStatus::Success => 5,
            ExecutionStatus::Skipped => 6,
            ExecutionStatus::Failed => 7,
            ExecutionStatus::Cancelled => 8,
            ExecutionStatus::Terminated => 9,
        }
    }

    pub(crate) const fn from_index(index: u8) -> ExecutionStatus {
        match index {
            1 => ExecutionStatus::Scheduled,
            2 => ExecutionStatus::Ongoing,
            3 => ExecutionStatus::OngoingScheduled,
            4 => ExecutionStatus::PartiallySkipped,
            5 => ExecutionStatus::Success,
            6 => ExecutionStatus::Skipped,
            7 => ExecutionStatus::Failed,
            8 => ExecutionStatus::Cancelled,
            9 => ExecutionStatus::Terminated,
            _ => ExecutionStatus::NotStarted,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
