use chain_controller_k8s_api as k8s;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the cluster collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error(transparent)]
    Api(#[from] k8s::Error),

    #[error("failed to encode authservice configuration: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A reconcile pass that stopped at `step`.
#[derive(Debug, thiserror::Error)]
#[error("failed to {step}: {source}")]
pub struct ReconcileError {
    pub step: Step,
    #[source]
    pub source: Error,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Enumerate,
    Publish,
    Policies,
    Prune,
    Restart,
}

// === impl Error ===

impl Error {
    pub fn not_found(kind: &'static str, namespace: impl ToString, name: impl ToString) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(k8s::Error::Api(rsp)) => rsp.code == 404,
            _ => false,
        }
    }
}

// === impl ReconcileError ===

impl ReconcileError {
    pub fn new(step: Step, source: Error) -> Self {
        Self { step, source }
    }
}

// === impl Step ===

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Enumerate => "enumerate",
            Self::Publish => "publish",
            Self::Policies => "policies",
            Self::Prune => "prune",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => "fetch chain".fmt(f),
            Self::Enumerate => "list chains".fmt(f),
            Self::Publish => "publish configuration".fmt(f),
            Self::Policies => "apply request authentications".fmt(f),
            Self::Prune => "prune request authentications".fmt(f),
            Self::Restart => "restart workload".fmt(f),
        }
    }
}
