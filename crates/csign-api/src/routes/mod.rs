//! # API Route Handlers
//!
//! One module per resource. Each exposes a `router()` returning
//! `Router<AppState>`; the routers are merged in `lib.rs`.

pub mod applications;
pub mod approval_forms;
pub mod approval_routes;
pub mod folders;
