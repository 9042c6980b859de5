//! # csign-core — Foundational Types for Countersign
//!
//! The leaf crate of the workspace. Defines the identifier newtypes
//! shared by the engine and API crates. Every other crate depends on
//! `csign-core`; it depends on nothing internal.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `csign-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod identity;

pub use identity::{ApplicationId, DocumentId, FolderId, FormId, RouteId, UserId};
