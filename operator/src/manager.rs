use crate::{
    Error, Metrics, Result,
    backoff::Backoff,
    cluster,
    config::ControllerConfig,
    store::{ClusterStore, KubeClusterStore, KubeSpaceStore, SpaceStore},
};
use chrono::{DateTime, Utc};
use common::{Cluster, ClusterRegistry, names};
use futures::{FutureExt, StreamExt, future::BoxFuture};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    ResourceExt,
    api::Api,
    client::Client,
    runtime::{
        controller::{self, Controller},
        events::{Recorder, Reporter},
        reflector::ObjectRef,
        watcher::Config,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Cluster records
    pub clusters: Arc<dyn ClusterStore>,
    /// Execution spaces
    pub spaces: Arc<dyn SpaceStore>,
    /// Registered member clusters, shared with the rest of the process
    pub registry: ClusterRegistry,
    /// Event recorder, absent when running without an API server
    pub recorder: Option<Recorder>,
    /// Retry delays per cluster
    pub backoff: Backoff,
    /// Runtime settings
    pub config: ControllerConfig,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
}

impl Context {
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        spaces: Arc<dyn SpaceStore>,
        registry: ClusterRegistry,
        config: ControllerConfig,
    ) -> Self {
        Self {
            clusters,
            spaces,
            registry,
            recorder: None,
            backoff: Backoff::new(config.backoff_base, config.backoff_max),
            config,
            diagnostics: Arc::default(),
            metrics: Metrics::default(),
        }
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "fleet-cluster-controller".into(),
        }
    }
}

/// Diagnostics enriched with the registered member clusters
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(flatten)]
    pub diagnostics: Diagnostics,
    pub registered_clusters: Vec<String>,
    pub ready_clusters: Vec<String>,
}

/// Data owned by the Manager
#[derive(Clone)]
pub struct Manager {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Registered member clusters
    registry: ClusterRegistry,
    /// Prometheus metrics
    metrics: Metrics,
}

/// Manager that owns a Controller for Cluster
impl Manager {
    /// Lifecycle initialization interface for app
    ///
    /// This returns a `Manager` that drives a `Controller` + a future to be awaited
    /// It is up to `main` to wait for the controller stream.
    pub async fn new(config: ControllerConfig) -> Result<(Self, BoxFuture<'static, ()>)> {
        let client = Client::try_default().await.map_err(Error::KubeError)?;
        let cluster_store = Arc::new(KubeClusterStore::new(client.clone(), config.store_timeout));
        let space_store = Arc::new(KubeSpaceStore::new(client.clone(), config.store_timeout));

        // Ensure CRD is installed before loop-watching, and load the current members
        let listing = cluster_store.list().await.map_err(|e| {
            tracing::error!("is the crd installed? please run: cargo run --bin crdgen | kubectl apply -f -");
            Error::StoreError(e)
        })?;
        let registry = ClusterRegistry::from_clusters(&listing);
        tracing::info!("Loaded {} member clusters", registry.len().await);

        let reporter = Reporter {
            controller: "fleet-cluster-controller".into(),
            instance: Some(config.pod_name.clone()),
        };
        let mut context = Context::new(cluster_store, space_store, registry.clone(), config.clone());
        context.recorder = Some(Recorder::new(client.clone(), reporter.clone()));
        context.diagnostics.write().await.reporter = reporter;
        let manager = Manager {
            diagnostics: context.diagnostics.clone(),
            registry,
            metrics: context.metrics.clone(),
        };

        let clusters = Api::<Cluster>::all(client.clone());
        let spaces = Api::<Namespace>::all(client);
        // All good. Start controller and return its future.
        let controller = Controller::new(clusters, Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(config.concurrency))
            .watches(
                spaces,
                Config::default().labels(names::EXECUTION_SPACE_LABEL_KEY),
                |ns: Namespace| names::cluster_name(&ns.name_any()).map(ObjectRef::<Cluster>::new),
            )
            .shutdown_on_signal()
            .run(cluster::reconcile, cluster::error_policy, Arc::new(context))
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        Ok((manager, controller))
    }

    /// Metrics getter
    pub fn metrics(&self) -> String {
        self.metrics.encode().unwrap_or_else(|e| {
            tracing::warn!("Encoding metrics failed: {e}");
            String::new()
        })
    }

    /// State getter
    pub async fn diagnostics(&self) -> Overview {
        Overview {
            diagnostics: self.diagnostics.read().await.clone(),
            registered_clusters: self.registry.names().await,
            ready_clusters: self.registry.ready_names().await,
        }
    }
}
