use crate::{
    controller::{self, Context},
    core,
    k8s::{self, Client, Resource},
    reconcile::{ConfigParams, KubeCluster, Metrics, Params, Reconciler, RestartPolicy},
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::{num::NonZeroU16, sync::Arc};
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "chain-controller", about = "Configures authservice from Chain resources")]
pub struct Args {
    #[clap(
        long,
        default_value = "chain_controller=info,warn",
        env = "CHAIN_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Number of authservice worker threads.
    ///
    /// Also bounds the number of chains reconciled concurrently.
    #[clap(long, default_value = "8")]
    threads: NonZeroU16,

    /// The authservice deployment restarted to pick up new configuration.
    #[clap(long, default_value = "authservice")]
    authservice_deployment_name: String,

    #[clap(long, default_value = "authservice-configmap")]
    config_map_name: String,

    #[clap(long, default_value = "0.0.0.0")]
    authservice_listen_address: String,

    #[clap(long, default_value = "10003")]
    authservice_listen_port: u16,

    #[clap(long, default_value = "trace")]
    authservice_log_level: String,

    /// Either `always` or `on-change`.
    #[clap(long, default_value = "always")]
    restart_policy: RestartPolicy,

    /// Delete RequestAuthentications written by this controller whose Chain
    /// no longer exists.
    #[clap(long)]
    prune_orphaned_policies: bool,

    #[clap(long, default_value = "5")]
    error_requeue_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            threads,
            authservice_deployment_name,
            config_map_name,
            authservice_listen_address,
            authservice_listen_port,
            authservice_log_level,
            restart_policy,
            prune_orphaned_policies,
            error_requeue_secs,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = Metrics::register(prom.sub_registry_with_prefix("chain_controller"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let params = Params {
            deployment_name: authservice_deployment_name,
            config: ConfigParams {
                name: config_map_name,
                threads: threads.get(),
                listener: core::Listener {
                    address: authservice_listen_address,
                    port: authservice_listen_port,
                    log_level: authservice_log_level,
                },
            },
            restart_policy,
            prune_orphaned_policies,
        };
        info!(?params, "Starting chain controller");

        let ctx = Arc::new(Context {
            reconciler: Reconciler::new(KubeCluster::new(runtime.client()), params, metrics),
            error_requeue: Duration::from_secs(error_requeue_secs),
        });

        let watch_policies =
            api_resource_exists::<k8s::RequestAuthentication>(&runtime.client()).await;
        if !watch_policies {
            tracing::warn!(
                "requestauthentications.security.istio.io resource kind not found, skipping watches"
            );
        }

        let shutdown = runtime.shutdown_handle();
        let client = runtime.client();
        tokio::spawn(
            async move {
                tokio::select! {
                    () = controller::run(client, ctx, threads.get(), watch_policies) => {}
                    release = shutdown.signaled() => drop(release),
                }
            }
            .instrument(info_span!("chains")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
