//! The authservice configuration document.
//!
//! Authservice reads a single JSON file describing its listener and an
//! ordered list of filter chains. The first chain whose match succeeds
//! handles a request; a chain without a match handles everything.

use serde::{Deserialize, Serialize};

/// Listener settings written at the top of every configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub address: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub listen_address: String,
    // Authservice parses the port as a string.
    pub listen_port: String,
    pub log_level: String,
    pub threads: u16,
    pub chains: Vec<FilterChain>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterChain {
    pub name: String,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_: Option<Match>,
    pub filters: Vec<Filter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Match {
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equality: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Oidc(OidcConfig),
    Mock(MockConfig),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OidcConfig {
    pub authorization_uri: String,
    pub token_uri: String,
    pub callback_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_fetcher: Option<JwksFetcher>,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_certificate_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_name_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    pub id_token: TokenConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<TokenConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout: Option<LogoutConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_session_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_session_timeout: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwksFetcher {
    pub jwks_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_fetch_interval_sec: Option<u32>,
}

/// Where a token is forwarded to the upstream, e.g. `Authorization: Bearer <token>`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenConfig {
    pub preamble: String,
    pub header: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogoutConfig {
    pub path: String,
    pub redirect_uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MockConfig {
    pub allow: bool,
}

// === impl Listener ===

impl Default for Listener {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 10003,
            log_level: "trace".to_string(),
        }
    }
}

// === impl Config ===

impl Config {
    pub fn new(listener: &Listener, threads: u16, chains: Vec<FilterChain>) -> Self {
        Self {
            listen_address: listener.address.clone(),
            listen_port: listener.port.to_string(),
            log_level: listener.log_level.clone(),
            threads,
            chains,
        }
    }

    /// Encodes the configuration as it is stored in the ConfigMap.
    ///
    /// The encoding depends only on the field values, so equal configurations
    /// always produce byte-identical documents.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
