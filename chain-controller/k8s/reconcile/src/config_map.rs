//! Derives the authservice ConfigMap from a namespace's chains.

use crate::{ConfigMapStore, Result};
use chain_controller_core::{self as core, CONFIG_KEY, CONTROLLER_NAME};
use chain_controller_k8s_api::{self as k8s, chain, Chain, ConfigMap, ObjectMeta, ResourceExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigParams {
    /// Name of the ConfigMap in each namespace.
    pub name: String,
    /// Worker threads for authservice; also the controller's concurrency width.
    pub threads: u16,
    pub listener: core::Listener,
}

/// The desired ConfigMap and what the store currently holds.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub config_map: ConfigMap,
    /// Whether the ConfigMap already exists, i.e. it must be updated rather
    /// than created.
    pub exists: bool,
    /// Whether the configuration differs from the stored one.
    pub changed: bool,
    /// Digest of the rendered configuration.
    pub revision: String,
}

impl Default for ConfigParams {
    fn default() -> Self {
        Self {
            name: "authservice-configmap".to_string(),
            threads: 8,
            listener: core::Listener::default(),
        }
    }
}

/// Builds the ConfigMap for `namespace` from `chains`.
///
/// An existing ConfigMap is used as the base of the update so that its
/// resource version and any foreign metadata are preserved.
pub async fn build<S>(
    store: &S,
    namespace: &str,
    chains: &[Chain],
    params: &ConfigParams,
) -> Result<Artifact>
where
    S: ConfigMapStore + ?Sized,
{
    let content = render(chains, params)?;
    let revision = revision(&content);
    let existing = store.get_config_map(namespace, &params.name).await?;

    let exists = existing.is_some();
    let changed = existing
        .as_ref()
        .and_then(|cm| cm.data.as_ref())
        .and_then(|data| data.get(CONFIG_KEY))
        .map_or(true, |current| *current != content);

    let mut config_map = existing.unwrap_or_else(|| ConfigMap {
        metadata: ObjectMeta {
            name: Some(params.name.clone()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    });
    config_map
        .labels_mut()
        .insert(k8s::MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string());
    config_map
        .data
        .get_or_insert_with(BTreeMap::new)
        .insert(CONFIG_KEY.to_string(), content);

    Ok(Artifact {
        config_map,
        exists,
        changed,
        revision,
    })
}

/// Hex-encoded SHA-256 of an encoded configuration.
pub fn revision(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Encodes the authservice configuration for `chains`, in order.
pub fn render(chains: &[Chain], params: &ConfigParams) -> Result<String> {
    let chains = chains.iter().map(filter_chain).collect();
    let config = core::Config::new(&params.listener, params.threads, chains);
    Ok(config.to_json()?)
}

fn filter_chain(chain: &Chain) -> core::FilterChain {
    let spec = &chain.spec;
    core::FilterChain {
        name: chain.name_any(),
        match_: spec.match_.as_ref().map(|m| core::Match {
            header: m.header.clone(),
            prefix: m.prefix.clone(),
            equality: m.equality.clone(),
        }),
        // Entries with neither filter set are dropped.
        filters: spec.filters.iter().filter_map(filter).collect(),
    }
}

fn filter(filter: &chain::Filter) -> Option<core::Filter> {
    if let Some(oidc) = filter.oidc.as_ref() {
        return Some(core::Filter::Oidc(oidc_config(oidc)));
    }
    filter
        .mock
        .as_ref()
        .map(|mock| core::Filter::Mock(core::MockConfig { allow: mock.allow }))
}

fn oidc_config(oidc: &chain::Oidc) -> core::OidcConfig {
    // An inline key set takes precedence over fetching one.
    let jwks_fetcher = match (&oidc.jwks, &oidc.jwks_uri) {
        (None, Some(uri)) => Some(core::JwksFetcher {
            jwks_uri: uri.clone(),
            periodic_fetch_interval_sec: oidc.jwks_fetch_interval_sec,
        }),
        _ => None,
    };

    core::OidcConfig {
        authorization_uri: oidc.authorization_uri.clone(),
        token_uri: oidc.token_uri.clone(),
        callback_uri: oidc.callback_uri.clone(),
        jwks: oidc.jwks.clone(),
        jwks_fetcher,
        client_id: oidc.client_id.clone(),
        client_secret: oidc.client_secret.clone(),
        trusted_certificate_authority: oidc.trusted_certificate_authority.clone(),
        cookie_name_prefix: oidc.cookie_name_prefix.clone(),
        scopes: oidc.scopes.clone(),
        id_token: token(&oidc.id_token),
        access_token: oidc.access_token.as_ref().map(token),
        logout: oidc.logout.as_ref().map(|l| core::LogoutConfig {
            path: l.path.clone(),
            redirect_uri: l.redirect_uri.clone(),
        }),
        absolute_session_timeout: oidc.absolute_session_timeout,
        idle_session_timeout: oidc.idle_session_timeout,
    }
}

fn token(t: &chain::Token) -> core::TokenConfig {
    core::TokenConfig {
        preamble: t.preamble.clone(),
        header: t.header.clone(),
    }
}
