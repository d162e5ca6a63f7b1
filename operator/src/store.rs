//! Store clients used by the cluster controller
//!
//! The controller only needs a handful of calls on two stores: the cluster
//! records and the execution spaces (namespaces). Both are traits so the state
//! machine can run against the real API server or a test double.
use async_trait::async_trait;
use common::Cluster;
use k8s_openapi::{api::core::v1::Namespace, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{
    Client,
    api::{Api, DeleteParams, PostParams},
};
use std::{collections::BTreeMap, future::Future, time::Duration};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("call on {0} did not complete within {1:?}")]
    Timeout(String, Duration),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),
}

impl StoreError {
    /// Classify an API error for the object `name`
    pub fn from_kube(name: &str, e: kube::Error) -> Self {
        if let kube::Error::Api(ae) = &e {
            if ae.code == 404 {
                return StoreError::NotFound(name.to_string());
            }
            if ae.code == 409 && ae.reason == "AlreadyExists" {
                return StoreError::AlreadyExists(name.to_string());
            }
        }
        StoreError::KubeError(e)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "notfound",
            StoreError::AlreadyExists(_) => "alreadyexists",
            StoreError::Timeout(_, _) => "timeout",
            StoreError::KubeError(_) => "kube",
        }
    }
}

/// Cluster records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a cluster by name
    async fn get(&self, name: &str) -> Result<Cluster, StoreError>;

    /// Write a cluster back, failing on a stale resource version
    async fn update(&self, cluster: &Cluster) -> Result<Cluster, StoreError>;

    /// List every registered cluster
    async fn list(&self) -> Result<Vec<Cluster>, StoreError>;
}

/// Execution spaces
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpaceStore: Send + Sync {
    /// Get a space by name
    async fn get(&self, name: &str) -> Result<Namespace, StoreError>;

    /// Create a space carrying `labels`
    async fn create(&self, name: &str, labels: BTreeMap<String, String>) -> Result<Namespace, StoreError>;

    /// Request the deletion of a space. The space may outlive this call.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}

async fn bounded<T, F>(name: &str, deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(res) => res.map_err(|e| StoreError::from_kube(name, e)),
        Err(_) => Err(StoreError::Timeout(name.to_string(), deadline)),
    }
}

/// Cluster store backed by the API server
#[derive(Clone)]
pub struct KubeClusterStore {
    api: Api<Cluster>,
    deadline: Duration,
}

impl KubeClusterStore {
    pub fn new(client: Client, deadline: Duration) -> Self {
        Self {
            api: Api::all(client),
            deadline,
        }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get(&self, name: &str) -> Result<Cluster, StoreError> {
        bounded(name, self.deadline, self.api.get(name)).await
    }

    async fn update(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        bounded(&name, self.deadline, self.api.replace(&name, &PostParams::default(), cluster)).await
    }

    async fn list(&self) -> Result<Vec<Cluster>, StoreError> {
        bounded("clusters", self.deadline, self.api.list(&Default::default()))
            .await
            .map(|l| l.items)
    }
}

/// Execution space store backed by namespaces
#[derive(Clone)]
pub struct KubeSpaceStore {
    api: Api<Namespace>,
    deadline: Duration,
}

impl KubeSpaceStore {
    pub fn new(client: Client, deadline: Duration) -> Self {
        Self {
            api: Api::all(client),
            deadline,
        }
    }
}

#[async_trait]
impl SpaceStore for KubeSpaceStore {
    async fn get(&self, name: &str) -> Result<Namespace, StoreError> {
        bounded(name, self.deadline, self.api.get(name)).await
    }

    async fn create(&self, name: &str, labels: BTreeMap<String, String>) -> Result<Namespace, StoreError> {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        };
        bounded(name, self.deadline, self.api.create(&PostParams::default(), &ns)).await
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match tokio::time::timeout(self.deadline, self.api.delete(name, &DeleteParams::default())).await {
            Ok(Ok(_)) => Ok(()),
            // the namespace is already terminating
            Ok(Err(kube::Error::Api(ae))) if ae.code == 409 && ae.reason == "Conflict" => Ok(()),
            Ok(Err(e)) => Err(StoreError::from_kube(name, e)),
            Err(_) => Err(StoreError::Timeout(name.to_string(), self.deadline)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} happened"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_error_classification() {
        assert!(StoreError::from_kube("exec-east-1", api_error(404, "NotFound")).is_not_found());
        assert!(matches!(
            StoreError::from_kube("exec-east-1", api_error(409, "AlreadyExists")),
            StoreError::AlreadyExists(_)
        ));
        // an update conflict is a plain transient failure
        assert!(matches!(
            StoreError::from_kube("east-1", api_error(409, "Conflict")),
            StoreError::KubeError(_)
        ));
        assert_eq!(StoreError::from_kube("east-1", api_error(500, "InternalError")).kind(), "kube");
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let res: Result<(), StoreError> = bounded("exec-east-1", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(StoreError::Timeout(_, _))));
    }
}
