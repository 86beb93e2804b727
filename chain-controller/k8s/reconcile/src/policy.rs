//! Derives and applies the RequestAuthentication for each chain.

use crate::{PolicyStore, Result};
use chain_controller_core::CONTROLLER_NAME;
use chain_controller_k8s_api::{
    self as k8s,
    security::{JwtHeader, JwtRule, WorkloadSelector},
    Chain, ObjectMeta, RequestAuthentication, RequestAuthenticationSpec, Resource, ResourceExt,
};
use std::collections::HashSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PolicyWrite {
    Created,
    Updated,
    Unchanged,
}

/// Builds the RequestAuthentication that enforces `chain`'s token
/// requirement.
///
/// The policy shares the chain's name and namespace and is owned by the
/// chain when the chain has been persisted.
pub fn request_authentication(chain: &Chain) -> RequestAuthentication {
    let jwt_rules = chain
        .spec
        .oidc_filters()
        .filter_map(|oidc| {
            // Istio requires an issuer on every rule.
            let issuer = oidc.issuer.clone()?;
            Some(JwtRule {
                issuer,
                audiences: vec![oidc.client_id.clone()],
                jwks_uri: oidc.jwks.is_none().then(|| oidc.jwks_uri.clone()).flatten(),
                jwks: oidc.jwks.clone(),
                from_headers: vec![JwtHeader {
                    name: oidc.id_token.header.clone(),
                    prefix: Some(format!("{} ", oidc.id_token.preamble)),
                }],
                forward_original_token: true,
            })
        })
        .collect();

    RequestAuthentication {
        metadata: ObjectMeta {
            name: Some(chain.name_any()),
            namespace: chain.namespace(),
            labels: Some(
                [(k8s::MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string())]
                    .into_iter()
                    .collect(),
            ),
            owner_references: chain.controller_owner_ref(&()).map(|oref| vec![oref]),
            ..Default::default()
        },
        spec: RequestAuthenticationSpec {
            selector: chain
                .spec
                .selector
                .clone()
                .map(|match_labels| WorkloadSelector { match_labels }),
            jwt_rules,
        },
    }
}

/// Creates or updates `chain`'s RequestAuthentication so that it matches the
/// chain. Nothing is written when the stored policy already matches.
pub async fn ensure<S>(store: &S, chain: &Chain) -> Result<PolicyWrite>
where
    S: PolicyStore + ?Sized,
{
    let desired = request_authentication(chain);
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();

    let Some(mut current) = store.get_policy(&namespace, &name).await? else {
        store.create_policy(&desired).await?;
        tracing::debug!(%namespace, %name, "Created RequestAuthentication");
        return Ok(PolicyWrite::Created);
    };

    let owners_match = desired.metadata.owner_references.is_none()
        || current.metadata.owner_references == desired.metadata.owner_references;
    if current.spec == desired.spec && is_managed(&current) && owners_match {
        return Ok(PolicyWrite::Unchanged);
    }

    // Keep the stored metadata, including its resource version, so the update
    // fails if the policy changed since it was read.
    current.spec = desired.spec;
    current
        .labels_mut()
        .insert(k8s::MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string());
    if desired.metadata.owner_references.is_some() {
        current.metadata.owner_references = desired.metadata.owner_references;
    }
    store.update_policy(&current).await?;
    tracing::debug!(%namespace, %name, "Updated RequestAuthentication");
    Ok(PolicyWrite::Updated)
}

/// Deletes the managed RequestAuthentications in `namespace` that no chain in
/// `chains` accounts for, returning their names.
pub async fn prune<S>(store: &S, namespace: &str, chains: &[Chain]) -> Result<Vec<String>>
where
    S: PolicyStore + ?Sized,
{
    let wanted = chains.iter().map(|c| c.name_any()).collect::<HashSet<_>>();

    let mut deleted = Vec::new();
    for policy in store.list_policies(namespace).await? {
        let name = policy.name_any();
        if !is_managed(&policy) || wanted.contains(&name) {
            continue;
        }
        match store.delete_policy(namespace, &name).await {
            Ok(()) => {}
            // Already gone.
            Err(error) if error.is_not_found() => continue,
            Err(error) => return Err(error),
        }
        tracing::info!(%namespace, %name, "Deleted orphaned RequestAuthentication");
        deleted.push(name);
    }
    Ok(deleted)
}

fn is_managed(policy: &RequestAuthentication) -> bool {
    policy
        .labels()
        .get(k8s::MANAGED_BY_LABEL)
        .is_some_and(|v| v == CONTROLLER_NAME)
}
