//! kuberc library crate
//!
//! Operates Redis Cluster and Redis Sentinel deployments on Kubernetes by
//! running `redis-cli` inside the pods and by port-forwarding to them.

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod resources;
pub mod sentinel;
pub mod signals;

pub use config::{ClientConfig, ClusterConfig, KubeConfigSource, SentinelConfig};
pub use error::{Error, ErrorKind, Result};
