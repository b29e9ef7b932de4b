//! Hierarchy registry
//!
//! Data access for the two-level subordinate hierarchy. Structural records
//! (kind, parent, enabled, address, port) live in [`STRUCTURAL_NAMESPACE`];
//! custom names live in [`DESCRIPTIVE_NAMESPACE`] under the same section
//! name. A node exists only if its structural record does.
//!
//! Invariants kept on every commit:
//! - ids are unique across the controller and every node
//! - a sub-subordinate's `via` names an existing subordinate
//! - deleting a subordinate deletes its sub-subordinates in the same commit
//!
//! Public methods take the [`DirectoryLock`] themselves. The `*_locked`
//! variants are for the manager, which already holds the write guard for a
//! longer sequence.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::MessageBus;
use crate::error::SubordinatesResult;
use crate::lock::{DirectoryLock, DirectoryWriteGuard};
use crate::store::{
    find_section, parse_bool, sections_by_type, store_bool, ConfigStore, Section, Transaction,
    DESCRIPTIVE_NAMESPACE, STRUCTURAL_NAMESPACE,
};
use crate::token::is_valid_controller_id;
use crate::types::{
    DescriptiveUpdate, NodeKind, Outcome, Refusal, SubSubordinate, SubSubordinateOptions,
    Subordinate, SubordinateOptions, UpdateEffect,
};

const SUBORDINATE: &str = "subordinate";
const SUBSUBORDINATE: &str = "subsubordinate";

/// Address reported for a subordinate without a stored one
const UNSET_ADDRESS: &str = "0.0.0.0";

pub struct HierarchyRegistry {
    store: Arc<dyn ConfigStore>,
    lock: DirectoryLock,
    controller_id: String,
    bus: MessageBus,
}

impl HierarchyRegistry {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        lock: DirectoryLock,
        controller_id: impl Into<String>,
        bus: MessageBus,
    ) -> Self {
        Self {
            store,
            lock,
            controller_id: controller_id.into(),
            bus,
        }
    }

    pub fn controller_id(&self) -> &str {
        &self.controller_id
    }

    pub fn bus(&self) -> MessageBus {
        self.bus
    }

    pub fn lock(&self) -> &DirectoryLock {
        &self.lock
    }

    /// All subordinates with their sub-subordinates
    pub async fn list(&self) -> SubordinatesResult<Vec<Subordinate>> {
        let _guard = self.lock.read().await;
        self.snapshot().await
    }

    /// The controller's id followed by every node id
    pub async fn existing_ids(&self) -> SubordinatesResult<BTreeSet<String>> {
        let _guard = self.lock.read().await;
        self.collect_ids().await
    }

    pub async fn add_sub_subordinate(
        &self,
        controller_id: &str,
        via: &str,
    ) -> SubordinatesResult<Outcome> {
        if !self.bus.supports_bridging() {
            return Ok(Outcome::Refused(Refusal::UnsupportedTransport));
        }

        let guard = self.lock.write().await;
        self.add_sub_subordinate_locked(&guard, controller_id, via).await
    }

    pub async fn set_enabled(
        &self,
        controller_id: &str,
        enabled: bool,
    ) -> SubordinatesResult<Outcome> {
        let guard = self.lock.write().await;
        self.set_enabled_locked(&guard, controller_id, enabled).await
    }

    /// Delete a node; a subordinate takes its sub-subordinates with it
    ///
    /// Returns the removed ids, the requested one first.
    pub async fn delete(&self, controller_id: &str) -> SubordinatesResult<Outcome<Vec<String>>> {
        let guard = self.lock.write().await;
        self.delete_locked(&guard, controller_id).await
    }

    pub async fn update_descriptive(
        &self,
        controller_id: &str,
        update: DescriptiveUpdate,
    ) -> SubordinatesResult<Outcome<UpdateEffect>> {
        let guard = self.lock.write().await;
        self.update_descriptive_locked(&guard, controller_id, update)
            .await
    }

    // Lock-free reads, callers hold a guard

    pub(crate) async fn snapshot(&self) -> SubordinatesResult<Vec<Subordinate>> {
        let structural = self.store.read(STRUCTURAL_NAMESPACE).await?;
        let descriptive = self.store.read(DESCRIPTIVE_NAMESPACE).await?;

        let custom_name = |section_type: &str, id: &str| -> String {
            sections_by_type(&descriptive, section_type)
                .find(|s| s.name == id)
                .and_then(|s| s.option("custom_name"))
                .unwrap_or_default()
                .to_string()
        };

        let mut children: HashMap<&str, Vec<SubSubordinate>> = HashMap::new();
        for section in sections_by_type(&structural, SUBSUBORDINATE) {
            let Some(via) = section.option("via") else {
                continue;
            };
            children.entry(via).or_default().push(SubSubordinate {
                controller_id: section.name.clone(),
                enabled: section.option("enabled").and_then(parse_bool).unwrap_or(true),
                options: SubSubordinateOptions {
                    custom_name: custom_name(SUBSUBORDINATE, &section.name),
                },
            });
        }

        let subordinates = sections_by_type(&structural, SUBORDINATE)
            .map(|section| Subordinate {
                controller_id: section.name.clone(),
                enabled: section.option("enabled").and_then(parse_bool).unwrap_or(false),
                options: SubordinateOptions {
                    custom_name: custom_name(SUBORDINATE, &section.name),
                    ip_address: section
                        .option("address")
                        .unwrap_or(UNSET_ADDRESS)
                        .to_string(),
                },
                port: section.option("port").and_then(|p| p.parse().ok()),
                subsubordinates: children.remove(section.name.as_str()).unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        debug!(count = subordinates.len(), "Listed subordinates");
        Ok(subordinates)
    }

    async fn collect_ids(&self) -> SubordinatesResult<BTreeSet<String>> {
        let structural = self.store.read(STRUCTURAL_NAMESPACE).await?;
        let mut ids = BTreeSet::from([self.controller_id.clone()]);
        ids.extend(
            structural
                .iter()
                .filter(|s| NodeKind::from_section_type(&s.section_type).is_some())
                .map(|s| s.name.clone()),
        );
        Ok(ids)
    }

    // Write paths, caller holds the write guard

    pub(crate) async fn existing_ids_locked(
        &self,
        _guard: &DirectoryWriteGuard,
    ) -> SubordinatesResult<BTreeSet<String>> {
        self.collect_ids().await
    }

    /// Create the structural record of a freshly provisioned subordinate
    pub(crate) async fn insert_subordinate_locked(
        &self,
        _guard: &DirectoryWriteGuard,
        controller_id: &str,
        address: &str,
        port: u16,
    ) -> SubordinatesResult<()> {
        let mut tx = Transaction::new();
        tx.add_section(STRUCTURAL_NAMESPACE, SUBORDINATE, controller_id)
            .set_option(STRUCTURAL_NAMESPACE, controller_id, "enabled", store_bool(true))
            .set_option(STRUCTURAL_NAMESPACE, controller_id, "address", address)
            .set_option(STRUCTURAL_NAMESPACE, controller_id, "port", port.to_string());
        self.store.commit(tx).await?;

        info!(controller_id, address, port, "Added subordinate");
        Ok(())
    }

    pub(crate) async fn add_sub_subordinate_locked(
        &self,
        guard: &DirectoryWriteGuard,
        controller_id: &str,
        via: &str,
    ) -> SubordinatesResult<Outcome> {
        if !is_valid_controller_id(controller_id) {
            debug!(controller_id, "Refusing malformed sub-subordinate id");
            return Ok(Outcome::Refused(Refusal::InvalidId(controller_id.to_string())));
        }

        if self.existing_ids_locked(guard).await?.contains(controller_id) {
            debug!(controller_id, "Refusing duplicate sub-subordinate");
            return Ok(Outcome::Refused(Refusal::DuplicateId(controller_id.to_string())));
        }

        let structural = self.store.read(STRUCTURAL_NAMESPACE).await?;
        if sections_by_type(&structural, SUBORDINATE).all(|s| s.name != via) {
            debug!(controller_id, via, "Refusing sub-subordinate with invalid parent");
            return Ok(Outcome::Refused(Refusal::InvalidParent(via.to_string())));
        }

        let mut tx = Transaction::new();
        tx.add_section(STRUCTURAL_NAMESPACE, SUBSUBORDINATE, controller_id)
            .set_option(STRUCTURAL_NAMESPACE, controller_id, "via", via)
            .set_option(STRUCTURAL_NAMESPACE, controller_id, "enabled", store_bool(true));
        self.store.commit(tx).await?;

        info!(controller_id, via, "Added sub-subordinate");
        Ok(Outcome::Applied(()))
    }

    pub(crate) async fn set_enabled_locked(
        &self,
        _guard: &DirectoryWriteGuard,
        controller_id: &str,
        enabled: bool,
    ) -> SubordinatesResult<Outcome> {
        let structural = self.store.read(STRUCTURAL_NAMESPACE).await?;
        if self.structural_record(&structural, controller_id).is_none() {
            return Ok(Outcome::Refused(Refusal::UnknownNode(controller_id.to_string())));
        }

        let mut tx = Transaction::new();
        tx.set_option(
            STRUCTURAL_NAMESPACE,
            controller_id,
            "enabled",
            store_bool(enabled),
        );
        if let Some(refusal) = self.commit_or_refuse(tx, controller_id).await? {
            return Ok(Outcome::Refused(refusal));
        }

        info!(controller_id, enabled, "Changed enabled flag");
        Ok(Outcome::Applied(()))
    }

    pub(crate) async fn delete_locked(
        &self,
        _guard: &DirectoryWriteGuard,
        controller_id: &str,
    ) -> SubordinatesResult<Outcome<Vec<String>>> {
        let structural = self.store.read(STRUCTURAL_NAMESPACE).await?;
        let descriptive = self.store.read(DESCRIPTIVE_NAMESPACE).await?;

        let Some(record) = self.structural_record(&structural, controller_id) else {
            return Ok(Outcome::Refused(Refusal::UnknownNode(controller_id.to_string())));
        };

        let mut removed = vec![controller_id.to_string()];
        if record.section_type == SUBORDINATE {
            removed.extend(
                sections_by_type(&structural, SUBSUBORDINATE)
                    .filter(|s| s.option("via") == Some(controller_id))
                    .map(|s| s.name.clone()),
            );
        }

        let mut tx = Transaction::new();
        for id in &removed {
            tx.del_section(STRUCTURAL_NAMESPACE, id);
            if find_section(&descriptive, id).is_some() {
                tx.del_section(DESCRIPTIVE_NAMESPACE, id);
            }
        }
        if let Some(refusal) = self.commit_or_refuse(tx, controller_id).await? {
            return Ok(Outcome::Refused(refusal));
        }

        info!(controller_id, cascaded = removed.len() - 1, "Deleted node");
        Ok(Outcome::Applied(removed))
    }

    pub(crate) async fn update_descriptive_locked(
        &self,
        _guard: &DirectoryWriteGuard,
        controller_id: &str,
        update: DescriptiveUpdate,
    ) -> SubordinatesResult<Outcome<UpdateEffect>> {
        let kind = update.kind();
        let structural = self.store.read(STRUCTURAL_NAMESPACE).await?;
        let Some(record) = sections_by_type(&structural, kind.section_type())
            .find(|s| s.name == controller_id)
        else {
            let refusal = match self.structural_record(&structural, controller_id) {
                Some(_) => Refusal::KindMismatch {
                    id: controller_id.to_string(),
                    expected: kind,
                },
                None => Refusal::UnknownNode(controller_id.to_string()),
            };
            return Ok(Outcome::Refused(refusal));
        };

        let mut effect = UpdateEffect::default();
        let mut tx = Transaction::new();
        tx.add_section(DESCRIPTIVE_NAMESPACE, kind.section_type(), controller_id)
            .set_option(
                DESCRIPTIVE_NAMESPACE,
                controller_id,
                "custom_name",
                update.custom_name(),
            );

        if let DescriptiveUpdate::Subordinate {
            address: Some(address),
            ..
        } = &update
        {
            effect.restart_required = record.option("address") != Some(address.as_str());
            tx.set_option(STRUCTURAL_NAMESPACE, controller_id, "address", address.as_str());
        }

        if let Some(refusal) = self.commit_or_refuse(tx, controller_id).await? {
            return Ok(Outcome::Refused(refusal));
        }

        info!(
            controller_id,
            kind = %kind,
            restart_required = effect.restart_required,
            "Updated node options"
        );
        Ok(Outcome::Applied(effect))
    }

    /// Structural record of either kind
    fn structural_record<'a>(
        &self,
        structural: &'a [Section],
        controller_id: &str,
    ) -> Option<&'a Section> {
        structural.iter().find(|s| {
            s.name == controller_id && NodeKind::from_section_type(&s.section_type).is_some()
        })
    }

    /// Commit, translating the store's not-found into a refusal
    async fn commit_or_refuse(
        &self,
        tx: Transaction,
        controller_id: &str,
    ) -> SubordinatesResult<Option<Refusal>> {
        match self.store.commit(tx).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_not_found() => {
                debug!(controller_id, "Commit rejected: {}", e);
                Ok(Some(Refusal::Vanished(controller_id.to_string())))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    const CONTROLLER: &str = "0000000000000001";

    fn registry_with(bus: MessageBus) -> (HierarchyRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = HierarchyRegistry::new(store.clone(), DirectoryLock::new(), CONTROLLER, bus);
        (registry, store)
    }

    async fn seed_subordinate(registry: &HierarchyRegistry, id: &str, address: &str) {
        let guard = registry.lock().write().await;
        registry
            .insert_subordinate_locked(&guard, id, address, 11884)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let (registry, _) = registry_with(MessageBus::Mqtt);
        assert!(registry.list().await.unwrap().is_empty());
        assert_eq!(
            registry.existing_ids().await.unwrap(),
            BTreeSet::from([CONTROLLER.to_string()])
        );
    }

    #[tokio::test]
    async fn test_listing_nests_children() {
        let (registry, _) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        seed_subordinate(&registry, "b", "10.0.0.2").await;
        assert!(registry.add_sub_subordinate("a1", "a").await.unwrap().is_applied());
        assert!(registry.add_sub_subordinate("a2", "a").await.unwrap().is_applied());

        let listing = registry.list().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].controller_id, "a");
        assert_eq!(listing[0].port, Some(11884));
        let children: Vec<_> = listing[0]
            .subsubordinates
            .iter()
            .map(|c| c.controller_id.as_str())
            .collect();
        assert_eq!(children, vec!["a1", "a2"]);
        assert!(listing[1].subsubordinates.is_empty());
    }

    #[tokio::test]
    async fn test_read_defaults() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        let mut tx = Transaction::new();
        tx.add_section(STRUCTURAL_NAMESPACE, SUBORDINATE, "bare")
            .add_section(STRUCTURAL_NAMESPACE, SUBSUBORDINATE, "child")
            .set_option(STRUCTURAL_NAMESPACE, "child", "via", "bare")
            .add_section(STRUCTURAL_NAMESPACE, SUBSUBORDINATE, "orphan")
            .set_option(STRUCTURAL_NAMESPACE, "orphan", "via", "gone")
            .add_section(STRUCTURAL_NAMESPACE, SUBSUBORDINATE, "no-via");
        store.commit(tx).await.unwrap();

        let listing = registry.list().await.unwrap();
        assert_eq!(listing.len(), 1);
        let bare = &listing[0];
        assert!(!bare.enabled);
        assert_eq!(bare.options.ip_address, UNSET_ADDRESS);
        assert_eq!(bare.port, None);
        assert_eq!(bare.subsubordinates.len(), 1);
        assert!(bare.subsubordinates[0].enabled);

        // Orphans are hidden from the listing but still reserve their ids
        let ids = registry.existing_ids().await.unwrap();
        assert!(ids.contains("orphan"));
        assert!(ids.contains("no-via"));
    }

    #[tokio::test]
    async fn test_sub_subordinate_requires_bridging_bus() {
        for bus in [MessageBus::Ubus, MessageBus::UnixSocket] {
            let (registry, store) = registry_with(bus);
            let outcome = registry.add_sub_subordinate("x", "a").await.unwrap();
            assert_eq!(outcome, Outcome::Refused(Refusal::UnsupportedTransport));
            assert!(store.snapshot().await.is_empty());
            assert_eq!(registry.lock().stats().writes(), 0);
        }
    }

    #[tokio::test]
    async fn test_sub_subordinate_parent_rules() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        assert!(registry.add_sub_subordinate("a1", "a").await.unwrap().is_applied());
        let before = store.snapshot().await;

        for via in ["a1", "missing", CONTROLLER] {
            let outcome = registry.add_sub_subordinate("new", via).await.unwrap();
            assert_eq!(outcome, Outcome::Refused(Refusal::InvalidParent(via.to_string())));
        }
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_sub_subordinate_id_must_be_unique() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        seed_subordinate(&registry, "b", "10.0.0.2").await;
        assert!(registry.add_sub_subordinate("a1", "a").await.unwrap().is_applied());
        let before = store.snapshot().await;

        for id in ["a", "a1", CONTROLLER] {
            let outcome = registry.add_sub_subordinate(id, "b").await.unwrap();
            assert_eq!(outcome, Outcome::Refused(Refusal::DuplicateId(id.to_string())));
        }
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_sub_subordinate_id_must_be_well_formed() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        let before = store.snapshot().await;

        for id in ["", "..", "a/b", "../precious", "with space"] {
            let outcome = registry.add_sub_subordinate(id, "a").await.unwrap();
            assert_eq!(outcome, Outcome::Refused(Refusal::InvalidId(id.to_string())));
        }
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let (registry, _) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        assert!(registry.add_sub_subordinate("a1", "a").await.unwrap().is_applied());

        assert!(registry.set_enabled("a1", false).await.unwrap().is_applied());
        assert!(registry.set_enabled("a", false).await.unwrap().is_applied());

        let listing = registry.list().await.unwrap();
        assert!(!listing[0].enabled);
        assert!(!listing[0].subsubordinates[0].enabled);

        assert_eq!(
            registry.set_enabled("nobody", true).await.unwrap(),
            Outcome::Refused(Refusal::UnknownNode("nobody".to_string()))
        );
        assert!(!registry.set_enabled(CONTROLLER, true).await.unwrap().is_applied());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        seed_subordinate(&registry, "b", "10.0.0.2").await;
        for child in ["a1", "a2"] {
            assert!(registry.add_sub_subordinate(child, "a").await.unwrap().is_applied());
        }
        assert!(registry.add_sub_subordinate("b1", "b").await.unwrap().is_applied());
        assert!(registry
            .update_descriptive(
                "a1",
                DescriptiveUpdate::SubSubordinate {
                    custom_name: "child".into()
                }
            )
            .await
            .unwrap()
            .is_applied());

        let removed = registry.delete("a").await.unwrap().applied().unwrap();
        assert_eq!(removed, vec!["a", "a1", "a2"]);

        let listing = registry.list().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].controller_id, "b");
        assert_eq!(listing[0].subsubordinates.len(), 1);

        let snapshot = store.snapshot().await;
        assert!(snapshot[DESCRIPTIVE_NAMESPACE].is_empty());
        assert_eq!(
            registry.existing_ids().await.unwrap(),
            BTreeSet::from([CONTROLLER.to_string(), "b".to_string(), "b1".to_string()])
        );
    }

    #[tokio::test]
    async fn test_delete_sub_subordinate_only() {
        let (registry, _) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        assert!(registry.add_sub_subordinate("a1", "a").await.unwrap().is_applied());

        assert_eq!(
            registry.delete("a1").await.unwrap(),
            Outcome::Applied(vec!["a1".to_string()])
        );
        let listing = registry.list().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert!(listing[0].subsubordinates.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_noop() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        let before = store.snapshot().await;

        for id in ["missing", CONTROLLER] {
            assert_eq!(
                registry.delete(id).await.unwrap(),
                Outcome::Refused(Refusal::UnknownNode(id.to_string()))
            );
        }
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_update_subordinate_address() {
        let (registry, _) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;

        let same = registry
            .update_descriptive(
                "a",
                DescriptiveUpdate::Subordinate {
                    custom_name: "router".into(),
                    address: Some("10.0.0.1".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(same, Outcome::Applied(UpdateEffect { restart_required: false }));

        let moved = registry
            .update_descriptive(
                "a",
                DescriptiveUpdate::Subordinate {
                    custom_name: "router".into(),
                    address: Some("10.0.0.9".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(moved, Outcome::Applied(UpdateEffect { restart_required: true }));

        let listing = registry.list().await.unwrap();
        assert_eq!(listing[0].options.custom_name, "router");
        assert_eq!(listing[0].options.ip_address, "10.0.0.9");
        assert!(listing[0].enabled);
    }

    #[tokio::test]
    async fn test_update_requires_matching_kind() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        seed_subordinate(&registry, "a", "10.0.0.1").await;
        assert!(registry.add_sub_subordinate("a1", "a").await.unwrap().is_applied());
        let before = store.snapshot().await;

        let outcome = registry
            .update_descriptive(
                "a1",
                DescriptiveUpdate::Subordinate {
                    custom_name: "x".into(),
                    address: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Refused(Refusal::KindMismatch {
                id: "a1".into(),
                expected: NodeKind::Subordinate
            })
        );

        let outcome = registry
            .update_descriptive(
                "ghost",
                DescriptiveUpdate::SubSubordinate {
                    custom_name: "x".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Refused(Refusal::UnknownNode("ghost".into())));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_descriptive_orphan_is_inert() {
        let (registry, store) = registry_with(MessageBus::Mqtt);
        let mut tx = Transaction::new();
        tx.add_section(DESCRIPTIVE_NAMESPACE, SUBORDINATE, "ghost")
            .set_option(DESCRIPTIVE_NAMESPACE, "ghost", "custom_name", "boo");
        store.commit(tx).await.unwrap();

        assert!(registry.list().await.unwrap().is_empty());
        assert!(!registry.existing_ids().await.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_vanished_section_is_refused() {
        let (registry, _) = registry_with(MessageBus::Mqtt);
        let guard = registry.lock().write().await;
        let mut tx = Transaction::new();
        tx.del_section(STRUCTURAL_NAMESPACE, "never-there");

        assert_eq!(
            registry.commit_or_refuse(tx, "never-there").await.unwrap(),
            Some(Refusal::Vanished("never-there".into()))
        );
        drop(guard);
    }
}
