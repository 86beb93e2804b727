//! An in-memory cluster that records every write.

use crate::{
    ChainId, ChainStore, ConfigMapStore, Error, PolicyStore, Result, WorkloadRestarter,
};
use chain_controller_k8s_api::{
    self as k8s, Chain, ConfigMap, ErrorResponse, RequestAuthentication, Resource, ResourceExt,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::Arc,
};

type Key = (String, String);

#[derive(Clone, Default)]
pub(crate) struct FakeCluster {
    state: Arc<Mutex<State>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    GetChain,
    ListChains,
    GetConfigMap,
    CreateConfigMap,
    UpdateConfigMap,
    GetPolicy,
    ListPolicies,
    CreatePolicy,
    UpdatePolicy,
    DeletePolicy,
    GetDeployment,
    Restart,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Write {
    CreateConfigMap(String),
    UpdateConfigMap(String),
    CreatePolicy(String),
    UpdatePolicy(String),
    DeletePolicy(String),
    Restart(String),
}

#[derive(Default)]
struct State {
    chains: Vec<Chain>,
    config_maps: BTreeMap<Key, ConfigMap>,
    policies: BTreeMap<Key, RequestAuthentication>,
    /// Deployments with the configuration revision they last restarted with.
    deployments: BTreeMap<Key, Option<String>>,
    writes: Vec<Write>,
    failures: Vec<Failure>,
    version: u64,
}

struct Failure {
    op: Op,
    name: Option<String>,
    code: u16,
}

fn api_error(code: u16, reason: &str, message: impl ToString) -> Error {
    Error::Api(k8s::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

fn key<T: Resource>(obj: &T) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

// === impl FakeCluster ===

impl FakeCluster {
    /// A cluster running the `authservice` deployment in `ns`.
    pub(crate) fn with_deployment(ns: &str) -> Self {
        let cluster = Self::default();
        cluster
            .state
            .lock()
            .deployments
            .insert((ns.to_string(), "authservice".to_string()), None);
        cluster
    }

    pub(crate) fn add_chain(&self, chain: Chain) {
        self.state.lock().chains.push(chain);
    }

    pub(crate) fn remove_chain(&self, ns: &str, name: &str) {
        self.state
            .lock()
            .chains
            .retain(|c| !(c.namespace().as_deref() == Some(ns) && c.name_any() == name));
    }

    pub(crate) fn insert_config_map(&self, mut cm: ConfigMap) {
        let mut state = self.state.lock();
        cm.metadata.resource_version = Some(state.next_version());
        state.config_maps.insert(key(&cm), cm);
    }

    pub(crate) fn insert_policy(&self, mut policy: RequestAuthentication) {
        let mut state = self.state.lock();
        policy.metadata.resource_version = Some(state.next_version());
        state.policies.insert(key(&policy), policy);
    }

    /// Makes every `op` (on `name`, when given) fail with the HTTP `code`.
    pub(crate) fn fail(&self, op: Op, name: Option<&str>, code: u16) {
        self.state.lock().failures.push(Failure {
            op,
            name: name.map(ToString::to_string),
            code,
        });
    }

    pub(crate) fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub(crate) fn config_map(&self, ns: &str, name: &str) -> Option<ConfigMap> {
        self.state
            .lock()
            .config_maps
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
    }

    pub(crate) fn policy(&self, ns: &str, name: &str) -> Option<RequestAuthentication> {
        self.state
            .lock()
            .policies
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
    }

    pub(crate) fn policy_names(&self, ns: &str) -> Vec<String> {
        self.state
            .lock()
            .policies
            .keys()
            .filter(|(n, _)| n == ns)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub(crate) fn writes(&self) -> Vec<Write> {
        self.state.lock().writes.clone()
    }

    pub(crate) fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut self.state.lock().writes)
    }

    /// The configuration revision `ns/name` was last restarted with.
    pub(crate) fn loaded_revision(&self, ns: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .deployments
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
            .flatten()
    }

    pub(crate) fn restarts(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| matches!(w, Write::Restart(_)))
            .count()
    }
}

// === impl Write ===

impl Write {
    /// The name of the object written, or `ns/name` for restarts.
    pub(crate) fn target(&self) -> &str {
        match self {
            Self::CreateConfigMap(t)
            | Self::UpdateConfigMap(t)
            | Self::CreatePolicy(t)
            | Self::UpdatePolicy(t)
            | Self::DeletePolicy(t)
            | Self::Restart(t) => t,
        }
    }
}

// === impl State ===

impl State {
    fn check(&self, op: Op, name: &str) -> Result<()> {
        match self
            .failures
            .iter()
            .find(|f| f.op == op && f.name.as_deref().map_or(true, |n| n == name))
        {
            Some(f) => Err(api_error(f.code, "Injected", format!("{op:?} {name}"))),
            None => Ok(()),
        }
    }

    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

// Create and update follow the API server's rules: creating an existing
// object and updating with a stale resource version are conflicts.
fn create<T: Resource + Clone>(
    objects: &mut BTreeMap<Key, T>,
    version: String,
    obj: &T,
) -> Result<()> {
    let k = key(obj);
    if objects.contains_key(&k) {
        return Err(api_error(409, "AlreadyExists", format!("{} exists", k.1)));
    }
    let mut obj = obj.clone();
    obj.meta_mut().resource_version = Some(version);
    objects.insert(k, obj);
    Ok(())
}

fn update<T: Resource + Clone>(
    objects: &mut BTreeMap<Key, T>,
    version: String,
    obj: &T,
) -> Result<()> {
    let k = key(obj);
    let Some(current) = objects.get(&k) else {
        return Err(api_error(404, "NotFound", format!("{} not found", k.1)));
    };
    if current.meta().resource_version != obj.meta().resource_version {
        return Err(api_error(409, "Conflict", format!("{} was modified", k.1)));
    }
    let mut obj = obj.clone();
    obj.meta_mut().resource_version = Some(version);
    objects.insert(k, obj);
    Ok(())
}

#[async_trait::async_trait]
impl ChainStore for FakeCluster {
    async fn get_chain(&self, id: &ChainId) -> Result<Chain> {
        let state = self.state.lock();
        state.check(Op::GetChain, &id.name)?;
        state
            .chains
            .iter()
            .find(|c| c.namespace().as_deref() == Some(&*id.namespace) && c.name_any() == id.name)
            .cloned()
            .ok_or_else(|| Error::not_found("Chain", &id.namespace, &id.name))
    }

    async fn list_chains(&self, namespace: &str) -> Result<Vec<Chain>> {
        let state = self.state.lock();
        state.check(Op::ListChains, namespace)?;
        Ok(state
            .chains
            .iter()
            .filter(|c| c.namespace().as_deref() == Some(namespace))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ConfigMapStore for FakeCluster {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let state = self.state.lock();
        state.check(Op::GetConfigMap, name)?;
        Ok(state
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let mut state = self.state.lock();
        let name = config_map.name_any();
        state.check(Op::CreateConfigMap, &name)?;
        let version = state.next_version();
        create(&mut state.config_maps, version, config_map)?;
        state.writes.push(Write::CreateConfigMap(name));
        Ok(())
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let mut state = self.state.lock();
        let name = config_map.name_any();
        state.check(Op::UpdateConfigMap, &name)?;
        let version = state.next_version();
        update(&mut state.config_maps, version, config_map)?;
        state.writes.push(Write::UpdateConfigMap(name));
        Ok(())
    }
}

#[async_trait::async_trait]
impl PolicyStore for FakeCluster {
    async fn get_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RequestAuthentication>> {
        let state = self.state.lock();
        state.check(Op::GetPolicy, name)?;
        Ok(state
            .policies
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_policies(&self, namespace: &str) -> Result<Vec<RequestAuthentication>> {
        let state = self.state.lock();
        state.check(Op::ListPolicies, namespace)?;
        Ok(state
            .policies
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn create_policy(&self, policy: &RequestAuthentication) -> Result<()> {
        let mut state = self.state.lock();
        let name = policy.name_any();
        state.check(Op::CreatePolicy, &name)?;
        let version = state.next_version();
        create(&mut state.policies, version, policy)?;
        state.writes.push(Write::CreatePolicy(name));
        Ok(())
    }

    async fn update_policy(&self, policy: &RequestAuthentication) -> Result<()> {
        let mut state = self.state.lock();
        let name = policy.name_any();
        state.check(Op::UpdatePolicy, &name)?;
        let version = state.next_version();
        update(&mut state.policies, version, policy)?;
        state.writes.push(Write::UpdatePolicy(name));
        Ok(())
    }

    async fn delete_policy(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check(Op::DeletePolicy, name)?;
        if state
            .policies
            .remove(&(namespace.to_string(), name.to_string()))
            .is_none()
        {
            return Err(api_error(404, "NotFound", format!("{name} not found")));
        }
        state.writes.push(Write::DeletePolicy(name.to_string()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkloadRestarter for FakeCluster {
    async fn config_revision(&self, name: &str, namespace: &str) -> Result<Option<String>> {
        let state = self.state.lock();
        state.check(Op::GetDeployment, name)?;
        state
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| api_error(404, "NotFound", format!("{name} not found")))
    }

    async fn restart(&self, name: &str, namespace: &str, revision: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check(Op::Restart, name)?;
        let Some(loaded) = state
            .deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
        else {
            return Err(api_error(404, "NotFound", format!("{name} not found")));
        };
        *loaded = Some(revision.to_string());
        state.writes.push(Write::Restart(format!("{namespace}/{name}")));
        Ok(())
    }
}
