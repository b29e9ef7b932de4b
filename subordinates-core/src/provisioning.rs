//! Provisioning orchestrator
//!
//! [`SubordinatesManager`] is the entry point for every hierarchy request.
//! It combines token decoding, credential materialization and the registry
//! under one write-lock acquisition per mutating operation, then (after the
//! commit) emits exactly one event and restarts the bridging service when
//! its live configuration went stale.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, MessageBus};
use crate::credentials::CredentialStore;
use crate::error::SubordinatesResult;
use crate::events::{BroadcastEventSink, EventSink, SubordinateEvent};
use crate::lock::DirectoryLock;
use crate::registry::HierarchyRegistry;
use crate::service::{CommandRestarter, NoopRestarter, ServiceRestarter};
use crate::store::ConfigStore;
use crate::token;
use crate::types::{DescriptiveUpdate, Outcome, Refusal, Subordinate};

pub struct SubordinatesManager {
    registry: HierarchyRegistry,
    credentials: CredentialStore,
    restarter: Arc<dyn ServiceRestarter>,
    events: Arc<dyn EventSink>,
}

impl SubordinatesManager {
    pub fn new(
        registry: HierarchyRegistry,
        credentials: CredentialStore,
        restarter: Arc<dyn ServiceRestarter>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            credentials,
            restarter,
            events,
        }
    }

    /// Wire a manager from configuration
    ///
    /// Restarts use the configured command (disabled when empty) and events
    /// go to a fresh [`BroadcastEventSink`]; both can be replaced with
    /// [`with_restarter`](Self::with_restarter) and
    /// [`with_event_sink`](Self::with_event_sink).
    pub fn from_config(config: &Config, store: Arc<dyn ConfigStore>, lock: DirectoryLock) -> Self {
        let registry = HierarchyRegistry::new(
            store,
            lock,
            config.controller.id.clone(),
            config.controller.bus,
        );
        let restarter: Arc<dyn ServiceRestarter> =
            match CommandRestarter::from_config(&config.service) {
                Some(restarter) => Arc::new(restarter),
                None => Arc::new(NoopRestarter),
            };

        Self::new(
            registry,
            CredentialStore::from_config(&config.credentials),
            restarter,
            Arc::new(BroadcastEventSink::default()),
        )
    }

    pub fn with_restarter(mut self, restarter: Arc<dyn ServiceRestarter>) -> Self {
        self.restarter = restarter;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &HierarchyRegistry {
        &self.registry
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    fn bus(&self) -> MessageBus {
        self.registry.bus()
    }

    pub async fn list(&self) -> SubordinatesResult<Vec<Subordinate>> {
        self.registry.list().await
    }

    /// Provision a subordinate from a token
    ///
    /// Returns the new controller id. Token decode failures are errors, not
    /// refusals.
    #[instrument(skip(self, token))]
    pub async fn add_subordinate(&self, token: &str) -> SubordinatesResult<Outcome<String>> {
        if !self.bus().supports_bridging() {
            debug!(bus = %self.bus(), "Provisioning not supported on this bus");
            return Ok(Outcome::Refused(Refusal::UnsupportedTransport));
        }

        let guard = self.registry.lock().write().await;

        let decoded = token::decode(token)?;
        let controller_id = decoded.manifest.device_id.clone();

        if self
            .registry
            .existing_ids_locked(&guard)
            .await?
            .contains(&controller_id)
        {
            info!(controller_id = %controller_id, "Refusing token for existing controller");
            return Ok(Outcome::Refused(Refusal::DuplicateId(controller_id)));
        }

        if let Err(e) = self.credentials.store(&controller_id, &decoded.blobs).await {
            warn!(
                controller_id = %controller_id,
                "Credentials not fully written, removing partial files: {}",
                e
            );
            self.credentials.remove(&controller_id).await;
            return Err(e);
        }

        let address = decoded.manifest.preferred_address().unwrap_or_default();
        if let Err(e) = self
            .registry
            .insert_subordinate_locked(&guard, &controller_id, address, decoded.manifest.port)
            .await
        {
            warn!(
                controller_id = %controller_id,
                "Structural record not created, removing credentials: {}",
                e
            );
            self.credentials.remove(&controller_id).await;
            return Err(e);
        }
        drop(guard);

        self.after_commit(
            SubordinateEvent::AddSub {
                controller_id: controller_id.clone(),
            },
            true,
        )
        .await;
        Ok(Outcome::Applied(controller_id))
    }

    #[instrument(skip(self))]
    pub async fn add_sub_subordinate(
        &self,
        controller_id: &str,
        via: &str,
    ) -> SubordinatesResult<Outcome> {
        let outcome = self.registry.add_sub_subordinate(controller_id, via).await?;
        if outcome.is_applied() {
            self.after_commit(
                SubordinateEvent::AddSubsub {
                    controller_id: controller_id.to_string(),
                    via: via.to_string(),
                },
                true,
            )
            .await;
        }
        Ok(outcome)
    }

    /// Delete a node, its sub-subordinates, and their credential files
    #[instrument(skip(self))]
    pub async fn delete(&self, controller_id: &str) -> SubordinatesResult<Outcome> {
        let guard = self.registry.lock().write().await;

        let removed = match self.registry.delete_locked(&guard, controller_id).await? {
            Outcome::Applied(removed) => removed,
            Outcome::Refused(refusal) => return Ok(Outcome::Refused(refusal)),
        };
        for id in &removed {
            self.credentials.remove(id).await;
        }
        drop(guard);

        self.after_commit(
            SubordinateEvent::Del {
                controller_id: controller_id.to_string(),
            },
            true,
        )
        .await;
        Ok(Outcome::Applied(()))
    }

    #[instrument(skip(self))]
    pub async fn set_enabled(
        &self,
        controller_id: &str,
        enabled: bool,
    ) -> SubordinatesResult<Outcome> {
        let outcome = self.registry.set_enabled(controller_id, enabled).await?;
        if outcome.is_applied() {
            self.after_commit(
                SubordinateEvent::SetEnabled {
                    controller_id: controller_id.to_string(),
                    enabled,
                },
                true,
            )
            .await;
        }
        Ok(outcome)
    }

    /// Rename a subordinate and optionally change its address
    #[instrument(skip(self))]
    pub async fn update_subordinate(
        &self,
        controller_id: &str,
        custom_name: &str,
        address: Option<&str>,
    ) -> SubordinatesResult<Outcome> {
        let update = DescriptiveUpdate::Subordinate {
            custom_name: custom_name.to_string(),
            address: address.map(str::to_string),
        };
        let outcome = self.registry.update_descriptive(controller_id, update).await?;

        Ok(match outcome {
            Outcome::Applied(effect) => {
                self.after_commit(
                    SubordinateEvent::UpdateSub {
                        controller_id: controller_id.to_string(),
                        custom_name: custom_name.to_string(),
                    },
                    effect.restart_required,
                )
                .await;
                Outcome::Applied(())
            }
            Outcome::Refused(refusal) => Outcome::Refused(refusal),
        })
    }

    #[instrument(skip(self))]
    pub async fn update_sub_subordinate(
        &self,
        controller_id: &str,
        custom_name: &str,
    ) -> SubordinatesResult<Outcome> {
        let update = DescriptiveUpdate::SubSubordinate {
            custom_name: custom_name.to_string(),
        };
        let outcome = self.registry.update_descriptive(controller_id, update).await?;

        if outcome.is_applied() {
            self.after_commit(
                SubordinateEvent::UpdateSubsub {
                    controller_id: controller_id.to_string(),
                    custom_name: custom_name.to_string(),
                },
                false,
            )
            .await;
        }
        Ok(outcome.map(|_| ()))
    }

    /// Post-commit effects; failures here never change the outcome
    async fn after_commit(&self, event: SubordinateEvent, restart: bool) {
        if restart {
            if let Err(e) = self.restarter.restart().await {
                warn!(
                    controller_id = event.controller_id(),
                    "Bridging service restart failed: {}",
                    e
                );
            }
        }
        self.events.emit(event);
    }
}
