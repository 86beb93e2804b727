use std::fmt;

/// Identifies the Chain that triggered a reconcile pass.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChainId {
    pub namespace: String,
    pub name: String,
}

impl ChainId {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
