// crates/trustwatch-core/src/identifiers.rs
// ============================================================================
// Module: Opaque Identifiers
// Description: Newtype wrappers over opaque string ids for every entity.
// Purpose: Prevent accidental cross-entity id mixing at the type level.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! All cross-entity links are by stable opaque identifier, never by in-memory
//! reference; entities are reconstituted per job. Each id wraps a `String` so
//! storage layers remain free to pick their own generation scheme (uuid, ulid,
//! or a sequential rowid rendered as text).

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string as this identifier without validation.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Returns the identifier's raw string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning its raw string form.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

opaque_id!(UserId, "Identifies the user that owns a [`crate::model::Company`].");
opaque_id!(CompanyId, "Identifies a watched vendor company.");
opaque_id!(TargetId, "Identifies a [`crate::model::CrawlTarget`] belonging to a company.");
opaque_id!(ClaimId, "Identifies the summary row for a single trust claim.");
opaque_id!(ClaimVersionId, "Identifies one append-only observation of a claim.");
opaque_id!(EventId, "Identifies a single change event.");
opaque_id!(CrawlRunId, "Identifies one orchestrated crawl cycle for a company.");
opaque_id!(EvidenceId, "Identifies a discovered PDF evidence artefact.");
