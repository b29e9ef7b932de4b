//! # subordinates-core
//!
//! Registry and provisioning for a two-level hierarchy of bridged
//! controllers: subordinates reachable directly from the primary
//! controller, and sub-subordinates reachable through one of them.
//!
//! ```text
//!   request ──► SubordinatesManager ──► DirectoryLock (read | write)
//!                   │
//!                   ├── token::decode          (base64 ► gzip ► tar)
//!                   ├── CredentialStore        (<bridges_dir>/<id>/*)
//!                   ├── HierarchyRegistry ───► ConfigStore
//!                   │
//!                   └── after commit: EventSink, ServiceRestarter
//! ```
//!
//! Library code emits `tracing` events and never installs a subscriber;
//! the binary does that.

pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod lock;
pub mod provisioning;
pub mod registry;
pub mod service;
pub mod store;
pub mod token;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::{Config, ConfigBuilder, MessageBus};
pub use error::{SubordinatesError, SubordinatesResult};
pub use lock::DirectoryLock;
pub use provisioning::SubordinatesManager;
pub use registry::HierarchyRegistry;
pub use types::{NodeKind, Outcome, Refusal, SubSubordinate, Subordinate};
