//! The cluster operations a reconcile pass depends on.
//!
//! Reads and writes go straight to the store; nothing is cached between
//! passes. Updates carry the resource version that was read, so a write
//! racing another writer fails with a conflict instead of clobbering it.

use crate::{ChainId, Result};
use chain_controller_k8s_api::{Chain, ConfigMap, RequestAuthentication};

#[async_trait::async_trait]
pub trait ChainStore: Send + Sync {
    async fn get_chain(&self, id: &ChainId) -> Result<Chain>;

    /// Lists the namespace's chains in the store's listing order.
    async fn list_chains(&self, namespace: &str) -> Result<Vec<Chain>>;
}

#[async_trait::async_trait]
pub trait ConfigMapStore: Send + Sync {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<()>;
}

#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RequestAuthentication>>;

    async fn list_policies(&self, namespace: &str) -> Result<Vec<RequestAuthentication>>;

    async fn create_policy(&self, policy: &RequestAuthentication) -> Result<()>;

    async fn update_policy(&self, policy: &RequestAuthentication) -> Result<()>;

    async fn delete_policy(&self, namespace: &str, name: &str) -> Result<()>;
}

#[async_trait::async_trait]
pub trait WorkloadRestarter: Send + Sync {
    /// Returns the configuration revision the named deployment was last
    /// restarted with, if any.
    async fn config_revision(&self, name: &str, namespace: &str) -> Result<Option<String>>;

    /// Triggers a rolling restart of the named deployment, recording
    /// `revision` on its pod template.
    async fn restart(&self, name: &str, namespace: &str, revision: &str) -> Result<()>;
}

pub trait Cluster: ChainStore + ConfigMapStore + PolicyStore + WorkloadRestarter {}

impl<T> Cluster for T where T: ChainStore + ConfigMapStore + PolicyStore + WorkloadRestarter {}
