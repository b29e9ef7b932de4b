use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConfigStore, Namespaces, Section, Transaction};
use crate::error::SubordinatesResult;

/// Store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Namespaces>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Namespaces) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copy of the full content, for assertions
    pub async fn snapshot(&self) -> Namespaces {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn read(&self, namespace: &str) -> SubordinatesResult<Vec<Section>> {
        Ok(self
            .data
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit(&self, transaction: Transaction) -> SubordinatesResult<()> {
        let mut data = self.data.write().await;
        transaction.apply_to(&mut data)
    }
}
