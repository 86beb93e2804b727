use crate::{ChainId, ChainStore, ConfigMapStore, PolicyStore, Result, WorkloadRestarter};
use chain_controller_core::CONTROLLER_NAME;
use chain_controller_k8s_api::{
    self as k8s, Chain, ConfigMap, Deployment, RequestAuthentication, ResourceExt,
};

/// The annotation `kubectl rollout restart` sets on a pod template.
const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Records which configuration the pods were restarted to load.
const CONFIG_REVISION_ANNOTATION: &str = "authcontroller.intel.com/config-revision";

/// Implements the cluster operations against the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: k8s::Client,
}

impl KubeCluster {
    pub fn new(client: k8s::Client) -> Self {
        Self { client }
    }

    fn api<T>(&self, namespace: &str) -> k8s::Api<T>
    where
        T: k8s::Resource<Scope = k8s::NamespaceResourceScope>,
        T::DynamicType: Default,
    {
        k8s::Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> k8s::PostParams {
        k8s::PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl ChainStore for KubeCluster {
    async fn get_chain(&self, id: &ChainId) -> Result<Chain> {
        let chain = self.api::<Chain>(&id.namespace).get(&id.name).await?;
        Ok(chain)
    }

    async fn list_chains(&self, namespace: &str) -> Result<Vec<Chain>> {
        let list = self
            .api::<Chain>(namespace)
            .list(&k8s::ListParams::default())
            .await?;
        Ok(list.items)
    }
}

#[async_trait::async_trait]
impl ConfigMapStore for KubeCluster {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let cm = self.api::<ConfigMap>(namespace).get_opt(name).await?;
        Ok(cm)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let namespace = config_map.namespace().unwrap_or_default();
        self.api::<ConfigMap>(&namespace)
            .create(&Self::post_params(), config_map)
            .await?;
        Ok(())
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let namespace = config_map.namespace().unwrap_or_default();
        self.api::<ConfigMap>(&namespace)
            .replace(&config_map.name_any(), &Self::post_params(), config_map)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PolicyStore for KubeCluster {
    async fn get_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RequestAuthentication>> {
        let policy = self
            .api::<RequestAuthentication>(namespace)
            .get_opt(name)
            .await?;
        Ok(policy)
    }

    async fn list_policies(&self, namespace: &str) -> Result<Vec<RequestAuthentication>> {
        let params = k8s::ListParams::default()
            .labels(&format!("{}={}", k8s::MANAGED_BY_LABEL, CONTROLLER_NAME));
        let list = self
            .api::<RequestAuthentication>(namespace)
            .list(&params)
            .await?;
        Ok(list.items)
    }

    async fn create_policy(&self, policy: &RequestAuthentication) -> Result<()> {
        let namespace = policy.namespace().unwrap_or_default();
        self.api::<RequestAuthentication>(&namespace)
            .create(&Self::post_params(), policy)
            .await?;
        Ok(())
    }

    async fn update_policy(&self, policy: &RequestAuthentication) -> Result<()> {
        let namespace = policy.namespace().unwrap_or_default();
        self.api::<RequestAuthentication>(&namespace)
            .replace(&policy.name_any(), &Self::post_params(), policy)
            .await?;
        Ok(())
    }

    async fn delete_policy(&self, namespace: &str, name: &str) -> Result<()> {
        self.api::<RequestAuthentication>(namespace)
            .delete(name, &k8s::DeleteParams::default())
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkloadRestarter for KubeCluster {
    async fn config_revision(&self, name: &str, namespace: &str) -> Result<Option<String>> {
        let deployment = self.api::<Deployment>(namespace).get(name).await?;
        let revision = deployment
            .spec
            .and_then(|spec| spec.template.metadata)
            .and_then(|meta| meta.annotations)
            .and_then(|mut annotations| annotations.remove(CONFIG_REVISION_ANNOTATION));
        Ok(revision)
    }

    async fn restart(&self, name: &str, namespace: &str, revision: &str) -> Result<()> {
        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            RESTARTED_AT_ANNOTATION: chrono::Utc::now().to_rfc3339(),
                            CONFIG_REVISION_ANNOTATION: revision,
                        }
                    }
                }
            }
        });
        let params = k8s::PatchParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        self.api::<Deployment>(namespace)
            .patch(name, &params, &k8s::Patch::Merge(&patch))
            .await?;
        tracing::info!(%namespace, %name, %revision, "Restarted deployment");
        Ok(())
    }
}
