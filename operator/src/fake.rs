//! In-memory stores used by the controller tests
//!
//! `FakeClusterStore` behaves like the API server for finalizers: a delete request
//! on a record holding finalizers only sets its deletion timestamp, and the record
//! is purged by the first write that leaves it terminating without finalizers.
//! `FakeSpaceStore` keeps deleted spaces observable for a configurable number of
//! reads.
use crate::store::{ClusterStore, SpaceStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use common::Cluster;
use k8s_openapi::{
    api::core::v1::Namespace,
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time},
};
use kube::{ResourceExt, core::ErrorResponse};
use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

fn conflict(name: &str) -> StoreError {
    StoreError::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("the object {name} has been modified"),
        reason: "Conflict".to_string(),
        code: 409,
    }))
}

#[derive(Default)]
pub struct FakeClusterStore {
    records: Mutex<BTreeMap<String, Cluster>>,
    pub updates: AtomicUsize,
}

impl FakeClusterStore {
    pub fn with(clusters: impl IntoIterator<Item = Cluster>) -> Self {
        let store = Self::default();
        for mut c in clusters {
            c.metadata.resource_version = Some("1".to_string());
            store.records.lock().unwrap().insert(c.name_any(), c);
        }
        store
    }

    /// Soft delete when finalizers are present, hard delete otherwise
    pub fn request_delete(&self, name: &str) {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(name) else {
            return;
        };
        if record.finalizers().is_empty() {
            records.remove(name);
        } else if record.metadata.deletion_timestamp.is_none() {
            record.metadata.deletion_timestamp = Some(Time(Utc::now()));
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.records.lock().unwrap().contains_key(name)
    }

    pub fn current(&self, name: &str) -> Option<Cluster> {
        self.records.lock().unwrap().get(name).cloned()
    }

    pub fn writes(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterStore for FakeClusterStore {
    async fn get(&self, name: &str) -> Result<Cluster, StoreError> {
        self.current(name).ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update(&self, cluster: &Cluster) -> Result<Cluster, StoreError> {
        let name = cluster.name_any();
        let mut records = self.records.lock().unwrap();
        let stored = records
            .get(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        if stored.metadata.resource_version != cluster.metadata.resource_version {
            return Err(conflict(&name));
        }
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut next = cluster.clone();
        // the deletion timestamp cannot be set or cleared by a client
        next.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        let version = stored
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        next.metadata.resource_version = Some((version + 1).to_string());
        if next.metadata.deletion_timestamp.is_some() && next.finalizers().is_empty() {
            records.remove(&name);
        } else {
            records.insert(name, next.clone());
        }
        Ok(next)
    }

    async fn list(&self) -> Result<Vec<Cluster>, StoreError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

struct Space {
    labels: BTreeMap<String, String>,
    /// Reads left before a deleted space disappears
    linger: Option<u32>,
}

#[derive(Default)]
pub struct FakeSpaceStore {
    spaces: Mutex<BTreeMap<String, Space>>,
    /// Reads a deleted space stays visible for
    deletion_lag: u32,
    pub creates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FakeSpaceStore {
    pub fn with_deletion_lag(lag: u32) -> Self {
        Self {
            deletion_lag: lag,
            ..Default::default()
        }
    }

    pub fn insert(&self, name: &str) {
        self.spaces.lock().unwrap().insert(name.to_string(), Space {
            labels: BTreeMap::new(),
            linger: None,
        });
    }

    pub fn exists(&self, name: &str) -> bool {
        self.spaces.lock().unwrap().contains_key(name)
    }

    pub fn labels(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.spaces.lock().unwrap().get(name).map(|s| s.labels.clone())
    }

    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
    }
}

fn namespace(name: &str, labels: &BTreeMap<String, String>) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[async_trait]
impl SpaceStore for FakeSpaceStore {
    async fn get(&self, name: &str) -> Result<Namespace, StoreError> {
        let mut spaces = self.spaces.lock().unwrap();
        let Some(space) = spaces.get_mut(name) else {
            return Err(StoreError::NotFound(name.to_string()));
        };
        let linger = space.linger;
        match linger {
            Some(0) => {
                spaces.remove(name);
                Err(StoreError::NotFound(name.to_string()))
            }
            Some(n) => {
                space.linger = Some(n - 1);
                Ok(namespace(name, &space.labels))
            }
            None => Ok(namespace(name, &space.labels)),
        }
    }

    async fn create(&self, name: &str, labels: BTreeMap<String, String>) -> Result<Namespace, StoreError> {
        let mut spaces = self.spaces.lock().unwrap();
        if spaces.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        let ns = namespace(name, &labels);
        spaces.insert(name.to_string(), Space { labels, linger: None });
        Ok(ns)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut spaces = self.spaces.lock().unwrap();
        let Some(space) = spaces.get_mut(name) else {
            return Err(StoreError::NotFound(name.to_string()));
        };
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.deletion_lag == 0 {
            spaces.remove(name);
        } else if space.linger.is_none() {
            space.linger = Some(self.deletion_lag);
        }
        Ok(())
    }
}
