//! Resource identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name and namespace of a local resource.
///
/// Every resource embeds one of these instead of inheriting an identity. The
/// `namespace/name` form is used as the sync key and as the remote name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub name: String,
    pub namespace: String,
}

impl ResourceIdentifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into() }
    }

    /// `namespace/name`, or just `name` when the namespace is empty.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
