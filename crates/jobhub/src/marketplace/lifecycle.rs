//! Job lifecycle state machine.
//!
//! ```text
//! open --select--> in_progress --mark_done--> provider_done --confirm--> completed
//!   \                  |
//!    \---cancel--------+--> cancelled
//! ```
//!
//! [`JobStatus::apply`] is the only place a status changes; the service asks
//! it for the next status and turns [`IllegalTransition`] into an
//! `InvalidState` error.

use std::fmt;

use serde::Serialize;

use super::domain::JobStatus;

/// Status-changing events a job can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTransition {
    SelectProvider,
    ProviderMarkDone,
    CustomerConfirmComplete,
    Cancel,
}

impl JobTransition {
    pub const fn label(self) -> &'static str {
        match self {
            JobTransition::SelectProvider => "select_provider",
            JobTransition::ProviderMarkDone => "provider_mark_done",
            JobTransition::CustomerConfirmComplete => "customer_confirm_complete",
            JobTransition::Cancel => "cancel",
        }
    }
}

impl fmt::Display for JobTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {transition} a job that is {from}")]
pub struct IllegalTransition {
    pub from: JobStatus,
    pub transition: JobTransition,
}

impl JobStatus {
    /// Transition table. Every (status, transition) pair is covered so adding a
    /// status or transition fails to compile until the table is updated.
    pub fn apply(self, transition: JobTransition) -> Result<JobStatus, IllegalTransition> {
        use JobStatus::*;
        use JobTransition::*;

        let next = match (self, transition) {
            (Open, SelectProvider) => Some(InProgress),
            (InProgress, ProviderMarkDone) => Some(ProviderDone),
            (ProviderDone, CustomerConfirmComplete) => Some(Completed),
            (Open, Cancel) | (InProgress, Cancel) => Some(Cancelled),

            (InProgress | ProviderDone | Completed | Cancelled, SelectProvider)
            | (Open | ProviderDone | Completed | Cancelled, ProviderMarkDone)
            | (Open | InProgress | Completed | Cancelled, CustomerConfirmComplete)
            | (ProviderDone | Completed | Cancelled, Cancel) => None,
        };

        next.ok_or(IllegalTransition {
            from: self,
            transition,
        })
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Statuses in which a job must carry an assigned provider, and the only
    /// ones in which it may.
    pub const fn holds_assignment(self) -> bool {
        matches!(
            self,
            JobStatus::InProgress | JobStatus::ProviderDone | JobStatus::Completed
        )
    }

    pub const fn accepts_rating(self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}
