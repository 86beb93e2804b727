use crate::{
    k8s::{self, ResourceExt},
    reconcile::{ChainId, KubeCluster, ReconcileError, Reconciler},
};
use futures::prelude::*;
use kube::runtime::controller::{self, Action, Controller};
use std::sync::Arc;
use tokio::time::Duration;

pub(crate) struct Context {
    pub(crate) reconciler: Reconciler<KubeCluster>,
    pub(crate) error_requeue: Duration,
}

/// Drives the reconciler from watches on Chains and the RequestAuthentications
/// they own, running at most `concurrency` passes at once.
pub(crate) async fn run(
    client: k8s::Client,
    ctx: Arc<Context>,
    concurrency: u16,
    watch_policies: bool,
) {
    let chains = k8s::Api::<k8s::Chain>::all(client.clone());
    let mut controller = Controller::new(chains, k8s::watcher::Config::default())
        .with_config(controller::Config::default().concurrency(concurrency));
    if watch_policies {
        let policies = k8s::Api::<k8s::RequestAuthentication>::all(client);
        controller = controller.owns(policies, k8s::watcher::Config::default());
    }

    controller
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((chain, _)) => tracing::debug!(%chain, "Reconciled"),
                Err(error) => tracing::warn!(%error, "Reconcile failed"),
            }
        })
        .await;
}

async fn reconcile(chain: Arc<k8s::Chain>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let id = ChainId::new(chain.namespace().unwrap_or_default(), chain.name_any());
    ctx.reconciler.reconcile(&id).await?;
    Ok(Action::await_change())
}

fn error_policy(_chain: Arc<k8s::Chain>, _error: &ReconcileError, ctx: Arc<Context>) -> Action {
    Action::requeue(ctx.error_requeue)
}
