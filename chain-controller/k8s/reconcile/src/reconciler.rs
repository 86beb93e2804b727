use crate::{
    config_map::{self, ConfigParams},
    policy, ChainId, Cluster, Metrics, ReconcileError, Step,
};
use std::{fmt, str::FromStr};
use tracing::{debug, error, info, instrument, warn};

/// Brings a namespace's authservice configuration and RequestAuthentications
/// in line with the namespace's chains.
///
/// The reconciler holds no state between passes. Every pass reads the
/// chains afresh and recomputes everything it writes, so a pass that loses a
/// race with another writer fails and is corrected by the next one.
pub struct Reconciler<C> {
    cluster: C,
    params: Params,
    metrics: Metrics,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Params {
    /// The authservice deployment restarted after each pass.
    pub deployment_name: String,
    pub config: ConfigParams,
    pub restart_policy: RestartPolicy,
    /// Delete managed RequestAuthentications whose chain no longer exists.
    pub prune_orphaned_policies: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Restart after every successful pass.
    #[default]
    Always,
    /// Restart only when the deployment was not last restarted with the
    /// current configuration.
    OnChange,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied {
        chains: usize,
        created: bool,
        restarted: bool,
        pruned: usize,
    },

    /// The triggering chain no longer exists; nothing was done.
    TriggerNotFound,

    /// A resource went missing at the given step. Nothing after that step was
    /// attempted and the pass is not retried.
    Abandoned(Step),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid restart policy: {0}")]
pub struct InvalidRestartPolicy(String);

// === impl Reconciler ===

impl<C: Cluster> Reconciler<C> {
    pub fn new(cluster: C, params: Params, metrics: Metrics) -> Self {
        Self {
            cluster,
            params,
            metrics,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Runs one pass for the namespace of the chain identified by `id`.
    ///
    /// Errors are returned for the caller to retry; not-found errors after the
    /// triggering chain has been read are logged and swallowed.
    #[instrument(skip(self), fields(namespace = %id.namespace, name = %id.name))]
    pub async fn reconcile(&self, id: &ChainId) -> Result<Outcome, ReconcileError> {
        let outcome = match self.apply(id).await {
            Ok(outcome) => outcome,
            Err(error) if error.source.is_not_found() => {
                warn!(step = %error.step.as_str(), %error, "Resource not found, ignoring");
                Outcome::Abandoned(error.step)
            }
            Err(error) => {
                error!(step = %error.step.as_str(), %error, "Failed to reconcile");
                self.metrics.failed(error.step);
                return Err(error);
            }
        };
        self.metrics.completed(&outcome);
        Ok(outcome)
    }

    async fn apply(&self, id: &ChainId) -> Result<Outcome, ReconcileError> {
        let Params {
            deployment_name,
            config,
            restart_policy,
            prune_orphaned_policies,
        } = &self.params;

        // The trigger only tells us which namespace to converge.
        match self.cluster.get_chain(id).await {
            Ok(_) => {}
            Err(error) if error.is_not_found() => {
                debug!("Chain not found, ignoring");
                return Ok(Outcome::TriggerNotFound);
            }
            Err(error) => return Err(ReconcileError::new(Step::Fetch, error)),
        }

        let chains = self
            .cluster
            .list_chains(&id.namespace)
            .await
            .map_err(|e| ReconcileError::new(Step::Enumerate, e))?;

        let artifact = config_map::build(&self.cluster, &id.namespace, &chains, config)
            .await
            .map_err(|e| ReconcileError::new(Step::Publish, e))?;
        let published = if artifact.exists {
            self.cluster.update_config_map(&artifact.config_map).await
        } else {
            self.cluster.create_config_map(&artifact.config_map).await
        };
        published.map_err(|e| ReconcileError::new(Step::Publish, e))?;
        debug!(
            configmap = %config.name,
            created = !artifact.exists,
            changed = artifact.changed,
            "Published configuration"
        );

        // Policies written before a failure are left in place.
        for chain in &chains {
            let write = policy::ensure(&self.cluster, chain)
                .await
                .map_err(|e| ReconcileError::new(Step::Policies, e))?;
            self.metrics.policy_write(write);
        }

        let mut pruned = 0;
        if *prune_orphaned_policies {
            let deleted = policy::prune(&self.cluster, &id.namespace, &chains)
                .await
                .map_err(|e| ReconcileError::new(Step::Prune, e))?;
            for _ in &deleted {
                self.metrics.policy_deleted();
            }
            pruned = deleted.len();
        }

        // Compared against what the deployment last loaded, not the stored
        // ConfigMap, which may have been published by a failed pass.
        let restart = match restart_policy {
            RestartPolicy::Always => true,
            RestartPolicy::OnChange => {
                let loaded = self
                    .cluster
                    .config_revision(deployment_name, &id.namespace)
                    .await
                    .map_err(|e| ReconcileError::new(Step::Restart, e))?;
                loaded.as_deref() != Some(artifact.revision.as_str())
            }
        };
        if restart {
            self.cluster
                .restart(deployment_name, &id.namespace, &artifact.revision)
                .await
                .map_err(|e| ReconcileError::new(Step::Restart, e))?;
            self.metrics.restarted();
        } else {
            debug!(deployment = %deployment_name, "Configuration unchanged, skipping restart");
        }

        info!(chains = chains.len(), restarted = restart, pruned, "Reconciled");
        Ok(Outcome::Applied {
            chains: chains.len(),
            created: !artifact.exists,
            restarted: restart,
            pruned,
        })
    }
}

// === impl Params ===

impl Default for Params {
    fn default() -> Self {
        Self {
            deployment_name: "authservice".to_string(),
            config: ConfigParams::default(),
            restart_policy: RestartPolicy::default(),
            prune_orphaned_policies: false,
        }
    }
}

// === impl RestartPolicy ===

impl FromStr for RestartPolicy {
    type Err = InvalidRestartPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "on-change" => Ok(Self::OnChange),
            s => Err(InvalidRestartPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => "always".fmt(f),
            Self::OnChange => "on-change".fmt(f),
        }
    }
}
