#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod security;

pub use self::{
    chain::{Chain, ChainSpec},
    security::{RequestAuthentication, RequestAuthenticationSpec},
};
pub use k8s_openapi::{
    api::{apps::v1::Deployment, core::v1::ConfigMap},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams},
    core::ErrorResponse,
    runtime::watcher,
    Client, Error, Resource, ResourceExt,
};

/// Label set on every object the controller writes.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
