//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier namespace in Countersign.
//! These prevent accidental identifier confusion — you cannot pass a
//! `FormId` where a `RouteId` is expected, and an approver's `UserId`
//! can never be swapped for an `ApplicationId` at a call site.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

id_newtype!(
    /// Unique identifier for a user (applicant or approver).
    UserId,
    "user"
);

id_newtype!(
    /// Unique identifier for an approval form definition.
    FormId,
    "form"
);

id_newtype!(
    /// Unique identifier for an approval route definition.
    RouteId,
    "route"
);

id_newtype!(
    /// Unique identifier for an application instance.
    ApplicationId,
    "application"
);

id_newtype!(
    /// Unique identifier for a folder.
    FolderId,
    "folder"
);

id_newtype!(
    /// Unique identifier for a filed document record.
    DocumentId,
    "document"
);
