use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    StoreError(#[from] store::StoreError),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Stdio error: {0}")]
    Stdio(#[from] std::io::Error),

    #[error("Naming error: {0}")]
    NamingError(#[source] common::Error),

    #[error("Unexpected transition: {0}")]
    UnexpectedTransition(String),

    #[error("Cluster {0} has no name")]
    MissingName(String),

    #[error("Error: {0}")]
    Other(String),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    #[must_use] pub fn metric_label(&self) -> String {
        match self {
            Error::StoreError(e) => format!("storeerror({})", e.kind()),
            Error::KubeError(_) => "kubeerror".to_string(),
            Error::Stdio(_) => "stdio".to_string(),
            Error::NamingError(_) => "namingerror".to_string(),
            Error::UnexpectedTransition(_) => "unexpectedtransition".to_string(),
            Error::MissingName(_) => "missingname".to_string(),
            Error::Other(_) => "other".to_string(),
        }
    }

    /// Retrying cannot fix a naming problem or a logic error, the record itself has to change
    #[must_use] pub fn is_retryable(&self) -> bool {
        match self {
            Error::StoreError(_) | Error::KubeError(_) | Error::Stdio(_) | Error::Other(_) => true,
            Error::NamingError(_) | Error::UnexpectedTransition(_) | Error::MissingName(_) => false,
        }
    }
}

/// Finalizer token owned by the cluster controller
pub static CLUSTER_FINALIZER: &str = "cluster.fleet.dev/cluster-controller";

pub mod backoff;
pub mod cluster;
pub mod config;
pub mod events;
pub mod store;

/// State machinery for kube, as exposeable to actix
pub mod manager;
pub use manager::Manager;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;

#[cfg(test)]
mod fake;
