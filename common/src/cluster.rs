use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the secret holding the credentials of a member cluster
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    /// Namespace of the secret
    pub namespace: String,
    /// Name of the secret
    pub name: String,
}

/// Describe a member cluster registered to the fleet control plane
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    kind = "Cluster",
    status = "ClusterStatus",
    shortname = "mc",
    group = "cluster.fleet.dev",
    version = "v1alpha1"
)]
#[kube(
    doc = "Custom resource representing a member cluster of the fleet",
    printcolumn = r#"
    {"name":"endpoint", "type":"string", "description":"API endpoint", "jsonPath":".spec.apiEndpoint"},
    {"name":"version",  "type":"string", "description":"Kubernetes version", "jsonPath":".status.kubernetesVersion"},
    {"name":"ready",    "type":"string", "description":"Ready", "jsonPath":".status.conditions[?(@.type == 'Ready')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Kubernetes API server endpoint of the member cluster
    pub api_endpoint: Option<String>,
    /// Secret holding the token and CA used to access the member cluster
    pub secret_ref: Option<LocalSecretReference>,
    /// Skip TLS verification when talking to the member cluster
    #[serde(default)]
    pub insecure_skip_tls_verification: bool,
    /// Cloud provider name
    pub provider: Option<String>,
    /// Region of the member cluster
    pub region: Option<String>,
    /// Zone of the member cluster
    pub zone: Option<String>,
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub enum ConditionsType {
    #[default]
    Ready,
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema, Default)]
pub enum ConditionsStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// ClusterCondition is produced by the health monitor of the member cluster
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type is a cluster condition type
    #[serde(rename = "type")]
    pub condition_type: ConditionsType,
    /// Status ("True", "False" or "Unknown") of the condition
    pub status: ConditionsStatus,
    /// One word reason for the last transition
    pub reason: Option<String>,
    /// Human-readable message indicating details about the condition
    pub message: Option<String>,
    /// LastTransitionTime is the time the condition was last observed
    pub last_transition_time: Option<DateTime<Utc>>,
}

/// The status object of `Cluster`
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Cluster conditions
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,
    /// Kubernetes version reported by the member cluster
    pub kubernetes_version: Option<String>,
}

impl Cluster {
    /// True when the health monitor reported the cluster as `Ready`
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.conditions
                .iter()
                .any(|c| c.condition_type == ConditionsType::Ready && c.status == ConditionsStatus::True)
        })
    }

    /// A terminating cluster has a deletion timestamp and waits for its finalizers
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn with_ready(status: ConditionsStatus) -> Cluster {
        let mut c = Cluster::new("east-1", ClusterSpec::default());
        c.status = Some(ClusterStatus {
            conditions: vec![ClusterCondition {
                condition_type: ConditionsType::Ready,
                status,
                reason: None,
                message: None,
                last_transition_time: None,
            }],
            kubernetes_version: Some("v1.31.2".to_string()),
        });
        c
    }

    #[test]
    fn test_ready_condition() {
        assert!(with_ready(ConditionsStatus::True).is_ready());
        assert!(!with_ready(ConditionsStatus::False).is_ready());
        assert!(!with_ready(ConditionsStatus::Unknown).is_ready());
        assert!(!Cluster::new("east-1", ClusterSpec::default()).is_ready());
    }

    #[test]
    fn test_terminating() {
        let mut c = Cluster::new("east-1", ClusterSpec::default());
        assert!(!c.is_terminating());
        c.metadata = ObjectMeta {
            name: Some("east-1".to_string()),
            deletion_timestamp: Some(Time(Utc::now())),
            ..Default::default()
        };
        assert!(c.is_terminating());
    }

    #[test]
    fn test_spec_field_names() {
        let spec: ClusterSpec = serde_json::from_value(serde_json::json!({
            "apiEndpoint": "https://10.0.0.1:6443",
            "secretRef": {"namespace": "fleet-system", "name": "east-1"},
            "insecureSkipTlsVerification": true,
            "region": "eu-west"
        }))
        .unwrap();
        assert_eq!(spec.api_endpoint.as_deref(), Some("https://10.0.0.1:6443"));
        assert_eq!(spec.secret_ref.unwrap().name, "east-1");
        assert!(spec.insecure_skip_tls_verification);
        assert_eq!(spec.zone, None);
    }
}
