//! Transactional key/value section store
//!
//! The store is addressed by `(namespace, section name)`; each section has a
//! type and an ordered option map. Mutations are collected into a
//! [`Transaction`] and applied by [`ConfigStore::commit`] all-or-nothing.
//!
//! Two implementations are provided: [`MemoryStore`] for tests and embedding,
//! and [`JsonFileStore`] which persists every namespace to a single JSON file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SubordinatesError, SubordinatesResult};

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Namespace holding structural records (kind, parent, enabled, endpoint)
pub const STRUCTURAL_NAMESPACE: &str = "fosquitto";

/// Namespace holding descriptive records (custom names)
pub const DESCRIPTIVE_NAMESPACE: &str = "foris-controller-subordinates";

/// A named, typed section with its options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(rename = "type")]
    pub section_type: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Section {
    pub fn new(section_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section_type: section_type.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Full store content: namespace -> ordered sections
pub type Namespaces = BTreeMap<String, Vec<Section>>;

/// One pending mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    AddSection {
        namespace: String,
        section_type: String,
        name: String,
    },
    SetOption {
        namespace: String,
        section: String,
        key: String,
        value: String,
    },
    DelSection {
        namespace: String,
        section: String,
    },
}

/// Batch of changes committed as a unit
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    changes: Vec<Change>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the section, or retype it if it already exists
    pub fn add_section(
        &mut self,
        namespace: &str,
        section_type: &str,
        name: &str,
    ) -> &mut Self {
        self.changes.push(Change::AddSection {
            namespace: namespace.to_string(),
            section_type: section_type.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn set_option(
        &mut self,
        namespace: &str,
        section: &str,
        key: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        self.changes.push(Change::SetOption {
            namespace: namespace.to_string(),
            section: section.to_string(),
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn del_section(&mut self, namespace: &str, section: &str) -> &mut Self {
        self.changes.push(Change::DelSection {
            namespace: namespace.to_string(),
            section: section.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Apply every change to a copy of `data`, replacing it only on success
    pub fn apply_to(&self, data: &mut Namespaces) -> SubordinatesResult<()> {
        let mut staged = data.clone();
        for change in &self.changes {
            apply_change(&mut staged, change)?;
        }
        *data = staged;
        Ok(())
    }
}

fn apply_change(data: &mut Namespaces, change: &Change) -> SubordinatesResult<()> {
    match change {
        Change::AddSection {
            namespace,
            section_type,
            name,
        } => {
            let sections = data.entry(namespace.clone()).or_default();
            match sections.iter_mut().find(|s| &s.name == name) {
                Some(existing) => existing.section_type = section_type.clone(),
                None => sections.push(Section::new(section_type.clone(), name.clone())),
            }
        }
        Change::SetOption {
            namespace,
            section,
            key,
            value,
        } => {
            let target = data
                .get_mut(namespace)
                .and_then(|sections| sections.iter_mut().find(|s| &s.name == section))
                .ok_or_else(|| SubordinatesError::section_not_found(namespace, section))?;
            target.options.insert(key.clone(), value.clone());
        }
        Change::DelSection { namespace, section } => {
            let sections = data
                .get_mut(namespace)
                .ok_or_else(|| SubordinatesError::section_not_found(namespace, section))?;
            let index = sections
                .iter()
                .position(|s| &s.name == section)
                .ok_or_else(|| SubordinatesError::section_not_found(namespace, section))?;
            sections.remove(index);
        }
    }
    Ok(())
}

/// Backend holding configuration sections
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read all sections of a namespace in stored order
    async fn read(&self, namespace: &str) -> SubordinatesResult<Vec<Section>>;

    /// Apply a transaction; on error nothing is applied
    async fn commit(&self, transaction: Transaction) -> SubordinatesResult<()>;
}

pub fn sections_by_type<'a>(
    sections: &'a [Section],
    section_type: &'a str,
) -> impl Iterator<Item = &'a Section> + 'a {
    sections
        .iter()
        .filter(move |s| s.section_type == section_type)
}

pub fn find_section<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    sections.iter().find(|s| s.name == name)
}

/// Parse a stored boolean, `None` if the value is not recognised
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "yes" | "on" | "true" | "enabled" => Some(true),
        "0" | "no" | "off" | "false" | "disabled" => Some(false),
        _ => None,
    }
}

pub fn store_bool(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
