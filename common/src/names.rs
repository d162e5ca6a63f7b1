//! Execution space naming
//!
//! Every member cluster owns exactly one execution space in the control plane.
//! The space name is the cluster name behind a fixed prefix, so the mapping is
//! injective and can be reversed. Names that would not survive as a namespace
//! name are rejected instead of being truncated or escaped.
use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Prefix of every execution space
pub static EXECUTION_SPACE_PREFIX: &str = "exec-";
/// Label carried by every execution space
pub static EXECUTION_SPACE_LABEL_KEY: &str = "cluster.fleet.dev/execution-space";
pub static EXECUTION_SPACE_LABEL_VALUE: &str = "";

/// Maximum length of a namespace name (RFC 1123 label)
const MAX_NAMESPACE_LEN: usize = 63;

lazy_static! {
    static ref DNS1123_LABEL: Regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap();
}

/// Longest cluster name that still fits in an execution space name
pub fn max_cluster_name_len() -> usize {
    MAX_NAMESPACE_LEN - EXECUTION_SPACE_PREFIX.len()
}

/// Generate the execution space name for a member cluster
pub fn execution_space_name(cluster: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidClusterName {
        name: cluster.to_string(),
        reason,
    };
    if cluster.is_empty() {
        return Err(invalid("name is empty".to_string()));
    }
    if cluster.len() > max_cluster_name_len() {
        return Err(invalid(format!(
            "name is {} characters long, at most {} are allowed",
            cluster.len(),
            max_cluster_name_len()
        )));
    }
    if !DNS1123_LABEL.is_match(cluster) {
        return Err(invalid(
            "only lowercase alphanumerics and '-' are allowed, starting and ending with an alphanumeric".to_string(),
        ));
    }
    Ok(format!("{EXECUTION_SPACE_PREFIX}{cluster}"))
}

/// Recover the member cluster name from an execution space name
pub fn cluster_name(space: &str) -> Option<&str> {
    space
        .strip_prefix(EXECUTION_SPACE_PREFIX)
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_prefixed_name() {
        assert_eq!(execution_space_name("east-1").unwrap(), "exec-east-1");
    }

    #[test]
    fn test_deterministic() {
        for name in ["east-1", "a", "member-cluster-42"] {
            assert_eq!(execution_space_name(name).unwrap(), execution_space_name(name).unwrap());
        }
    }

    #[test]
    fn test_distinct_inputs_never_collide() {
        let inputs = [
            "a", "b", "ab", "a-b", "ab-", "east", "east-1", "east-11", "east-1-1", "exec", "exec-a", "0", "00",
        ];
        let mut seen = BTreeSet::new();
        for name in inputs {
            if let Ok(space) = execution_space_name(name) {
                assert!(seen.insert(space), "collision for {name}");
            }
        }
        // "ab-" is the only rejected input
        assert_eq!(seen.len(), inputs.len() - 1);
    }

    #[test]
    fn test_longest_name_fits() {
        let longest = "a".repeat(max_cluster_name_len());
        let space = execution_space_name(&longest).unwrap();
        assert_eq!(space.len(), 63);
        assert!(DNS1123_LABEL.is_match(&space));
    }

    #[test]
    fn test_too_long_is_rejected() {
        let name = "a".repeat(max_cluster_name_len() + 1);
        assert!(matches!(
            execution_space_name(&name),
            Err(Error::InvalidClusterName { .. })
        ));
    }

    #[test]
    fn test_bad_characters_are_rejected() {
        for name in ["", "East", "east.1", "-east", "east-", "east_1"] {
            assert!(execution_space_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_reverse_mapping() {
        let space = execution_space_name("east-1").unwrap();
        assert_eq!(cluster_name(&space), Some("east-1"));
        assert_eq!(cluster_name("default"), None);
        assert_eq!(cluster_name("exec-"), None);
    }
}
