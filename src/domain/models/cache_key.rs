use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::CacheError;

/// Prefix of the per-key load lock name.
const LOAD_LOCK_PREFIX: &str = "load:";

/// Prefix of the stale shadow copy kept for lock-timeout fallback.
const STALE_PREFIX: &str = "stale:";

/// Namespaces owned by the engine's internal keys.
const RESERVED_NAMESPACES: [&str; 2] = ["load", "stale"];

/// Namespaced cache key, e.g. `product:42`.
///
/// The namespace identifies the entity type and may not contain `:`, so two
/// keys from different entity types can never render to the same string.
/// `load` and `stale` are reserved for lock names and stale shadows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from an entity namespace and an identifier.
    pub fn new(namespace: &str, id: impl fmt::Display) -> Result<Self, CacheError> {
        if namespace.is_empty() {
            return Err(CacheError::InvalidKey(
                "namespace cannot be empty".to_string(),
            ));
        }
        if namespace.contains(':') {
            return Err(CacheError::InvalidKey(format!(
                "namespace '{namespace}' cannot contain ':'"
            )));
        }
        if RESERVED_NAMESPACES.contains(&namespace) {
            return Err(CacheError::InvalidKey(format!(
                "namespace '{namespace}' is reserved"
            )));
        }
        Ok(Self(format!("{namespace}:{id}")))
    }

    /// Parse an already-rendered key.
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        match raw.split_once(':') {
            Some((namespace, id)) => Self::new(namespace, id),
            None => Err(CacheError::InvalidKey(format!(
                "'{raw}' is missing a namespace"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Entity namespace portion of the key.
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or("", |(ns, _)| ns)
    }

    /// Name of the distributed lock guarding loads of this key.
    pub fn load_lock_name(&self) -> String {
        format!("{LOAD_LOCK_PREFIX}{}", self.0)
    }

    /// Key holding the stale shadow copy of this key's value.
    pub fn stale_key(&self) -> String {
        format!("{STALE_PREFIX}{}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CacheKey {
    type Error = CacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}
