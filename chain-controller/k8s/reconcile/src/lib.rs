#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod chain_id;
mod client;
pub mod cluster;
pub mod config_map;
mod error;
mod metrics;
pub mod policy;
mod reconciler;


pub use self::{
    chain_id::ChainId,
    client::KubeCluster,
    cluster::{ChainStore, Cluster, ConfigMapStore, PolicyStore, WorkloadRestarter},
    config_map::{Artifact, ConfigParams},
    error::{Error, ReconcileError, Result, Step},
    metrics::Metrics,
    policy::PolicyWrite,
    reconciler::{InvalidRestartPolicy, Outcome, Params, Reconciler, RestartPolicy},
};
