use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cluster name {name:?} cannot be encoded as an execution space: {reason}")]
    InvalidClusterName { name: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod cluster;
pub mod finalizer;
pub mod names;
pub mod overridepolicy;
pub mod registry;

pub use cluster::Cluster;
pub use overridepolicy::OverridePolicy;
pub use registry::{ClusterRegistry, MemberCluster};

