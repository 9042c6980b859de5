//! # csign-engine — Approval Workflow Engine
//!
//! The domain model and transition engine for Countersign. Pure and
//! synchronous: no I/O, no ambient state — every operation takes the
//! caller's identity as an explicit parameter, and the surrounding
//! service layer is responsible for running transitions inside a
//! single critical section per application.
//!
//! ## Modules
//!
//! - **status** (`status.rs`): the closed `ApprovalStatus` enum and
//!   the `Decision` enum recorded in history entries.
//! - **form** (`form.rs`): `ApprovalForm` field schemas with
//!   structural validation and required-field checking of submitted
//!   values.
//! - **route** (`route.rs`): `ApprovalRoute` ordered approver steps
//!   with the contiguous-from-1 step invariant.
//! - **application** (`application.rs`): the `Application` aggregate
//!   and its guarded transitions (submit, approve, reject, update,
//!   delete), with an append-only decision history.

pub mod application;
pub mod form;
pub mod route;
pub mod status;

pub use application::{Application, ApproveOutcome, HistoryEntry, TransitionError};
pub use form::{ApprovalForm, FieldType, FormError, FormField};
pub use route::{ApprovalRoute, RouteError, RouteStep};
pub use status::{ApprovalStatus, Decision};
