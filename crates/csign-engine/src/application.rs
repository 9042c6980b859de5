//! # Application Lifecycle State Machine
//!
//! Models the lifecycle of an application — one instantiated form
//! submission routed through an ordered sequence of approvers.
//!
//! ## States
//!
//! ```text
//! DRAFT ──submit──▶ PENDING (step 1) ──approve──▶ PENDING (step 2) ── … ──▶ APPROVED
//!   │                   │
//! delete             reject
//!   ▼                   ▼
//! (removed)          REJECTED (terminal)
//! ```
//!
//! ## Design Decision
//!
//! States are an enum with validated transitions rather than
//! typestates. The pipeline length is data (the route's step count),
//! so the set of intermediate states is not known at compile time;
//! `submit`/`approve`/`reject` return `Result` and reject illegal
//! (state, actor) pairs at runtime with structured errors.
//!
//! The route's approver sequence is snapshotted onto the application
//! at submission time. The set of identities that can act on an
//! in-flight application is therefore fixed the moment it enters the
//! pipeline; editing the route affects only future submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use csign_core::{ApplicationId, DocumentId, FormId, RouteId, UserId};

use crate::form::{ApprovalForm, FormError};
use crate::route::{ApprovalRoute, RouteStep};
use crate::status::{ApprovalStatus, Decision};

/// One decision in an application's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The step the decision was made at.
    pub step: u32,
    /// Who decided.
    pub approver_id: UserId,
    pub decision: Decision,
    /// Free text, stored verbatim, never interpreted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Outcome of a successful approve action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveOutcome {
    /// The pipeline advanced to the given step, still PENDING.
    Advanced { next_step: u32 },
    /// The last step approved; the application is now APPROVED.
    FinalApproved,
}

/// Errors from application transitions.
///
/// Every (state, actor) pair outside the transition table maps to
/// one of the first three variants; all three are conflicts from the
/// caller's point of view ("the action is not legal right now").
#[derive(Error, Debug)]
pub enum TransitionError {
    /// The action is not legal in the current state.
    #[error("cannot {action} application in state {status}")]
    InvalidState {
        action: &'static str,
        status: ApprovalStatus,
    },

    /// The caller is not the applicant.
    #[error("caller {caller} is not the applicant of this application")]
    NotApplicant { caller: UserId },

    /// The caller is not the approver bound to the active step.
    #[error("caller {caller} is not the approver for step {step}")]
    NotCurrentApprover { caller: UserId, step: u32 },

    /// Submitted form data failed schema checking.
    #[error(transparent)]
    Form(#[from] FormError),
}

/// An application: one in-progress or completed submission of a form
/// routed through a route.
///
/// All mutation goes through the transition methods; illegal
/// transitions are rejected with structured errors identifying the
/// current state and the rejected action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub form_id: FormId,
    /// Form name captured at creation; later renames do not affect it.
    pub form_name: String,
    pub route_id: RouteId,
    /// Route name captured at creation.
    pub route_name: String,
    pub applicant_id: UserId,
    pub status: ApprovalStatus,
    /// 1-based active step while PENDING; 0 in DRAFT. Frozen at the
    /// step that decided the outcome once terminal.
    pub current_step: u32,
    /// Field values, copied at creation and editable only in DRAFT.
    pub form_data: serde_json::Value,
    /// Approver sequence snapshotted at submission. Empty in DRAFT.
    pub route_steps: Vec<RouteStep>,
    /// Append-only decision log, at most one entry per route step.
    pub history: Vec<HistoryEntry>,
    /// Output document filed on final approval, if the form names a
    /// target folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Create a DRAFT application bound to a form and route.
    ///
    /// Snapshots `form_data` and denormalizes the form and route
    /// names so historical display survives later renames.
    pub fn draft(
        form: &ApprovalForm,
        route: &ApprovalRoute,
        applicant_id: UserId,
        form_data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationId::new(),
            form_id: form.id,
            form_name: form.name.clone(),
            route_id: route.id,
            route_name: route.name.clone(),
            applicant_id,
            status: ApprovalStatus::Draft,
            current_step: 0,
            form_data,
            route_steps: Vec::new(),
            history: Vec::new(),
            document_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Submit a DRAFT for approval (DRAFT → PENDING, step 1).
    ///
    /// Requires the caller to be the applicant, checks the submitted
    /// values against the form's schema, and snapshots the route's
    /// step sequence onto the application.
    pub fn submit(
        &mut self,
        caller: UserId,
        form: &ApprovalForm,
        route: &ApprovalRoute,
    ) -> Result<(), TransitionError> {
        self.require_applicant(caller)?;
        self.require_status(ApprovalStatus::Draft, "submit")?;
        form.check_submission(&self.form_data)?;

        self.route_steps = route.steps.clone();
        self.current_step = 1;
        self.status = ApprovalStatus::Pending;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Approve the active step (PENDING → PENDING at next step, or
    /// APPROVED when the last step is approved).
    pub fn approve(
        &mut self,
        caller: UserId,
        comment: Option<String>,
    ) -> Result<ApproveOutcome, TransitionError> {
        self.require_status(ApprovalStatus::Pending, "approve")?;
        self.require_current_approver(caller)?;

        let now = Utc::now();
        self.history.push(HistoryEntry {
            step: self.current_step,
            approver_id: caller,
            decision: Decision::Approve,
            comment,
            decided_at: now,
        });
        self.updated_at = now;

        if self.current_step >= self.route_steps.len() as u32 {
            self.status = ApprovalStatus::Approved;
            Ok(ApproveOutcome::FinalApproved)
        } else {
            self.current_step += 1;
            Ok(ApproveOutcome::Advanced {
                next_step: self.current_step,
            })
        }
    }

    /// Reject the active step (PENDING → REJECTED, terminal).
    pub fn reject(&mut self, caller: UserId, comment: Option<String>) -> Result<(), TransitionError> {
        self.require_status(ApprovalStatus::Pending, "reject")?;
        self.require_current_approver(caller)?;

        let now = Utc::now();
        self.history.push(HistoryEntry {
            step: self.current_step,
            approver_id: caller,
            decision: Decision::Reject,
            comment,
            decided_at: now,
        });
        self.status = ApprovalStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    /// Replace the draft's form data. Applicant-only, DRAFT-only.
    pub fn update_form_data(
        &mut self,
        caller: UserId,
        form_data: serde_json::Value,
    ) -> Result<(), TransitionError> {
        self.require_applicant(caller)?;
        self.require_status(ApprovalStatus::Draft, "update")?;
        self.form_data = form_data;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check whether the caller may delete this application.
    ///
    /// Deletion is only legal for the applicant's own DRAFT. The
    /// store performs the actual removal.
    pub fn check_delete(&self, caller: UserId) -> Result<(), TransitionError> {
        self.require_applicant(caller)?;
        self.require_status(ApprovalStatus::Draft, "delete")?;
        Ok(())
    }

    /// Link the output document filed on final approval.
    pub fn attach_document(&mut self, document_id: DocumentId) {
        self.document_id = Some(document_id);
        self.updated_at = Utc::now();
    }

    /// The approver bound to the active step, while PENDING.
    pub fn active_approver(&self) -> Option<UserId> {
        if self.status != ApprovalStatus::Pending {
            return None;
        }
        self.route_steps
            .iter()
            .find(|s| s.step_number == self.current_step)
            .map(|s| s.approver_id)
    }

    /// Whether the given identity appears anywhere in the snapshotted
    /// approver sequence.
    pub fn names_approver(&self, user_id: UserId) -> bool {
        self.route_steps.iter().any(|s| s.approver_id == user_id)
    }

    fn require_status(
        &self,
        expected: ApprovalStatus,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::InvalidState {
                action,
                status: self.status,
            });
        }
        Ok(())
    }

    fn require_applicant(&self, caller: UserId) -> Result<(), TransitionError> {
        if caller != self.applicant_id {
            return Err(TransitionError::NotApplicant { caller });
        }
        Ok(())
    }

    fn require_current_approver(&self, caller: UserId) -> Result<(), TransitionError> {
        match self.active_approver() {
            Some(approver) if approver == caller => Ok(()),
            _ => Err(TransitionError::NotCurrentApprover {
                caller,
                step: self.current_step,
            }),
        }
    }
}
