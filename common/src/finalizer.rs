//! Finalizer token helpers
//!
//! These only touch the in-memory object; the caller persists the change.
//! Each helper handles a single token and leaves the other owners' tokens alone.
use kube::{Resource, ResourceExt};

/// True when `token` is present on the object
pub fn has<K: Resource>(obj: &K, token: &str) -> bool {
    obj.finalizers().iter().any(|f| f == token)
}

/// Append `token` when missing. Returns true when the object changed.
pub fn add<K: Resource>(obj: &mut K, token: &str) -> bool {
    if has(obj, token) {
        return false;
    }
    obj.finalizers_mut().push(token.to_string());
    true
}

/// Drop `token` when present. Returns true when the object changed.
pub fn remove<K: Resource>(obj: &mut K, token: &str) -> bool {
    if !has(obj, token) {
        return false;
    }
    obj.finalizers_mut().retain(|f| f != token);
    true
}
