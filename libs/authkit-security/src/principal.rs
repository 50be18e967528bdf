use std::fmt;
use std::hash::Hash;

/// An authenticated identity.
///
/// Equality and hashing must be based on identity: the authorization cache
/// keys on `(principal, role)` and collapses equal principals into one slot.
pub trait Principal: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Stable identity/display name.
    fn name(&self) -> &str;
}

/// Principal identified by its name only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct BasicPrincipal {
    name: String,
}

impl BasicPrincipal {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Principal for BasicPrincipal {
    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for BasicPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
