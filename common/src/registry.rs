use crate::cluster::{Cluster, LocalSecretReference};
use kube::ResourceExt;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

/// Connection details of a registered member cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCluster {
    pub name: String,
    pub api_endpoint: Option<String>,
    pub secret_ref: Option<LocalSecretReference>,
    pub insecure_skip_tls_verification: bool,
    pub ready: bool,
}

impl From<&Cluster> for MemberCluster {
    fn from(cluster: &Cluster) -> Self {
        Self {
            name: cluster.name_any(),
            api_endpoint: cluster.spec.api_endpoint.clone(),
            secret_ref: cluster.spec.secret_ref.clone(),
            insecure_skip_tls_verification: cluster.spec.insecure_skip_tls_verification,
            ready: cluster.is_ready(),
        }
    }
}

/// Registered member clusters, keyed by cluster name
///
/// Built once at startup from the current set of clusters and kept up to date by
/// the cluster controller. Clones share the same map.
#[derive(Clone, Default)]
pub struct ClusterRegistry {
    members: Arc<RwLock<BTreeMap<String, MemberCluster>>>,
}

impl ClusterRegistry {
    /// Build a registry from a listing, skipping terminating clusters
    pub fn from_clusters<'a>(clusters: impl IntoIterator<Item = &'a Cluster>) -> Self {
        let members = clusters
            .into_iter()
            .filter(|c| !c.is_terminating())
            .map(|c| (c.name_any(), MemberCluster::from(c)))
            .collect();
        Self {
            members: Arc::new(RwLock::new(members)),
        }
    }

    /// Insert or refresh a member
    pub async fn register(&self, cluster: &Cluster) {
        let member = MemberCluster::from(cluster);
        self.members.write().await.insert(member.name.clone(), member);
    }

    /// Returns the removed member, if any
    pub async fn unregister(&self, name: &str) -> Option<MemberCluster> {
        self.members.write().await.remove(name)
    }

    pub async fn get(&self, name: &str) -> Option<MemberCluster> {
        self.members.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        self.members.read().await.keys().cloned().collect()
    }

    pub async fn ready_names(&self) -> Vec<String> {
        self.members
            .read()
            .await
            .values()
            .filter(|m| m.ready)
            .map(|m| m.name.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}
