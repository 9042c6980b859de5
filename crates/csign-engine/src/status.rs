//! Approval status and decision enums.
//!
//! The status enumeration is closed: there are exactly four states
//! and no mechanism for callers to define more.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an application.
///
/// ```text
/// DRAFT ──submit──▶ PENDING ──approve (last step)──▶ APPROVED
///   │                  │
/// delete            reject
///   ▼                  ▼
/// (removed)         REJECTED
/// ```
///
/// APPROVED and REJECTED are terminal: no transition leaves them,
/// and the record becomes immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Created by the applicant, editable, not yet in the pipeline.
    Draft,
    /// Submitted and awaiting the current step's approver.
    Pending,
    /// Every route step approved (terminal).
    Approved,
    /// Rejected at some step (terminal).
    Rejected,
}

impl ApprovalStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// The canonical string form, as serialized on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single approver's decision, recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// The canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
