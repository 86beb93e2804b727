use std::collections::BTreeMap;

/// Describes one authservice filter chain.
///
/// Every Chain in a namespace contributes one entry to that namespace's
/// authservice configuration, in listing order.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "authcontroller.intel.com",
    version = "v1",
    kind = "Chain",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ChainSpec {
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_: Option<Match>,

    #[serde(default)]
    pub filters: Vec<Filter>,

    /// Labels of the workloads that must present a token issued for this
    /// chain. When unset, the requirement applies to the whole namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,
}

#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equality: Option<String>,
}

/// Exactly one of the fields is expected to be set.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<Oidc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock: Option<Mock>,
}

#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Oidc {
    pub authorization_uri: String,
    pub token_uri: String,
    pub callback_uri: String,
    pub client_id: String,
    pub client_secret: String,

    /// Inline JSON Web Key Set. Takes precedence over `jwksUri`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_fetch_interval_sec: Option<u32>,

    /// Token issuer, used to validate tokens at the workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_certificate_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_name_prefix: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub id_token: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout: Option<Logout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_session_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_session_timeout: Option<u32>,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub preamble: String,
    pub header: String,
}

#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Logout {
    pub path: String,
    pub redirect_uri: String,
}

#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
pub struct Mock {
    #[serde(default)]
    pub allow: bool,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            preamble: "Bearer".to_string(),
            header: "Authorization".to_string(),
        }
    }
}

impl ChainSpec {
    pub fn oidc_filters(&self) -> impl Iterator<Item = &Oidc> {
        self.filters.iter().filter_map(|f| f.oidc.as_ref())
    }
}
