//! Shared types for the subordinate hierarchy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node in the two-level hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Directly reachable from the controller
    Subordinate,
    /// Reachable only through its parent subordinate
    SubSubordinate,
}

impl NodeKind {
    /// Section type used for this kind in both store partitions
    pub fn section_type(&self) -> &'static str {
        match self {
            NodeKind::Subordinate => "subordinate",
            NodeKind::SubSubordinate => "subsubordinate",
        }
    }

    pub fn from_section_type(section_type: &str) -> Option<Self> {
        match section_type {
            "subordinate" => Some(NodeKind::Subordinate),
            "subsubordinate" => Some(NodeKind::SubSubordinate),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_type())
    }
}

/// User-facing options of a subordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubordinateOptions {
    pub custom_name: String,
    pub ip_address: String,
}

/// User-facing options of a sub-subordinate
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubSubordinateOptions {
    pub custom_name: String,
}

/// A second-level node as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSubordinate {
    pub controller_id: String,
    pub enabled: bool,
    pub options: SubSubordinateOptions,
}

/// A first-level node with its children, as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subordinate {
    pub controller_id: String,
    pub enabled: bool,
    pub options: SubordinateOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub subsubordinates: Vec<SubSubordinate>,
}

/// Why an operation was refused
///
/// Refusals are expected outcomes, distinct from [`crate::error::SubordinatesError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// The active message bus cannot bridge subordinates
    UnsupportedTransport,
    /// The id cannot name a section or a credential directory
    InvalidId(String),
    /// The id is already the controller's or another node's
    DuplicateId(String),
    /// No structural record exists for the id
    UnknownNode(String),
    /// The requested parent is not an existing subordinate
    InvalidParent(String),
    /// The node exists but is of the other kind
    KindMismatch { id: String, expected: NodeKind },
    /// The store rejected the commit because a section disappeared
    Vanished(String),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::UnsupportedTransport => write!(f, "message bus does not support bridging"),
            Refusal::InvalidId(id) => write!(f, "{:?} is not a valid controller id", id),
            Refusal::DuplicateId(id) => write!(f, "controller id {} already exists", id),
            Refusal::UnknownNode(id) => write!(f, "controller id {} does not exist", id),
            Refusal::InvalidParent(id) => write!(f, "{} is not a subordinate", id),
            Refusal::KindMismatch { id, expected } => {
                write!(f, "controller id {} is not a {}", id, expected)
            }
            Refusal::Vanished(section) => write!(f, "section {} vanished before commit", section),
        }
    }
}

/// Result of a mutating operation that may be refused
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T = ()> {
    Applied(T),
    Refused(Refusal),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Refused(_) => None,
        }
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Refused(refusal) => Some(refusal),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Refused(refusal) => Outcome::Refused(refusal),
        }
    }
}

/// Change to the descriptive record of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptiveUpdate {
    Subordinate {
        custom_name: String,
        /// New network address; `None` leaves the stored address untouched
        address: Option<String>,
    },
    SubSubordinate {
        custom_name: String,
    },
}

impl DescriptiveUpdate {
    pub fn kind(&self) -> NodeKind {
        match self {
            DescriptiveUpdate::Subordinate { .. } => NodeKind::Subordinate,
            DescriptiveUpdate::SubSubordinate { .. } => NodeKind::SubSubordinate,
        }
    }

    pub fn custom_name(&self) -> &str {
        match self {
            DescriptiveUpdate::Subordinate { custom_name, .. }
            | DescriptiveUpdate::SubSubordinate { custom_name } => custom_name,
        }
    }
}

/// Side effects an applied descriptive update asks the caller to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateEffect {
    pub restart_required: bool,
}
