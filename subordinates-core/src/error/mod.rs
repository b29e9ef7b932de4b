//! Error handling for the subordinate hierarchy
//!
//! Two kinds of failure exist in this crate and they are kept apart:
//!
//! - **Refusals** are expected outcomes of a well-formed request (duplicate
//!   id, unknown node, unsupported transport). They are not errors and are
//!   returned as [`crate::types::Outcome::Refused`].
//! - **Errors** are everything else and travel as [`SubordinatesError`]:
//!   token decode failures, store IO, configuration problems.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Store            │  Token (fatal)       │  Environment  │
//! │  • SectionNotFound│  • InvalidToken      │  • Io         │
//! │  • Storage        │  • ManifestMissing   │  • Config     │
//! │  • Json           │  • ManifestAmbiguous │  • Restart    │
//! │                   │  • InvalidManifest   │  • Internal   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `SectionNotFound` is caught by the registry and turned into a refusal;
//! token errors always propagate to the caller.

pub mod constructors;
pub mod conversions;
pub mod types;

pub use types::{Result, SubordinatesError, SubordinatesResult};
