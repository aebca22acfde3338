//! Job identity: which calls share a lock.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::JobCall;

/// Infix between the namespace and the identity in every lease key.
pub const KEY_INFIX: &str = "single_instance";

/// String key naming one slot of mutual exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobIdentity(String);

impl JobIdentity {
    /// Identity shared by every call of `name`, whatever its arguments.
    pub fn for_name(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Identity of `name` called with exactly these arguments.
    pub fn for_call(name: &str, call: &JobCall) -> Self {
        Self(format!("{name}.args.{}", args_digest(call)))
    }

    pub fn derive(name: &str, call: &JobCall, include_args: bool) -> Self {
        if include_args {
            Self::for_call(name, call)
        } else {
            Self::for_name(name)
        }
    }

    /// Lease key in the shared store: `<namespace>.single_instance.<identity>`.
    pub fn lock_key(&self, namespace: &str) -> String {
        format!("{namespace}.{KEY_INFIX}.{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex SHA-256 of the canonical argument encoding.
///
/// Canonical form is the JSON array `[args, [[key, value], ...]]` with
/// positional arguments in call order and keyword pairs sorted by key.
/// `serde_json::Map` keeps nested object keys sorted as well.
pub fn args_digest(call: &JobCall) -> String {
    let kwargs: Vec<Value> = call
        .kwargs
        .iter()
        .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
        .collect();
    let canonical = Value::Array(vec![Value::Array(call.args.clone()), Value::Array(kwargs)]);

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
