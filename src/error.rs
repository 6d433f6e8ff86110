//! Error types for kuberc.
//!
//! Module-level failures (`ParseError`, `ExecError`, `PortForwardError`)
//! fold into one crate-level [`Error`], classified by [`ErrorKind`].
//! Nothing in the crate retries; every error goes back to the caller.

use thiserror::Error;

use crate::client::types::ParseError;
use crate::resources::exec::ExecError;
use crate::resources::port_forward::PortForwardError;

/// Error type for kuberc operations
#[derive(Error, Debug)]
pub enum Error {
    /// The named pod does not exist
    #[error("pod {namespace}/{name} not found")]
    PodNotFound { namespace: String, name: String },

    /// The pod exists but has no container with the requested name
    #[error("can't find container {container} in pod {pod}")]
    ContainerNotFound { pod: String, container: String },

    /// The pod is not part of the cluster topology it was looked up in
    #[error("can't find pod {0} in redis cluster nodes")]
    NotInCluster(String),

    /// An operation was refused before touching the cluster
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A reported IP has no matching pod in the namespace
    #[error("can't find pod for ip {ip} in namespace {namespace}")]
    Correlation { namespace: String, ip: String },

    /// Command tunnel failure
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Port-forward failure
    #[error(transparent)]
    PortForward(#[from] PortForwardError),

    /// Malformed protocol reply
    #[error("Format error: {0}")]
    Format(#[from] ParseError),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig could not be read or applied
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// No usable client configuration was found
    #[error("Failed to infer Kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// Redis wire client error
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Workload, container or cluster member not found.
    Resolution,
    /// Refused before any remote call: bad flags, wrong pod state.
    Precondition,
    /// Exec stream or port-forward failure.
    Tunnel,
    /// Malformed protocol line or token count.
    Format,
    /// IP with no matching workload.
    Correlation,
    /// Kubernetes API failure outside a tunnel.
    Api,
    /// Redis wire client failure.
    Redis,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PodNotFound { .. } | Error::ContainerNotFound { .. } | Error::NotInCluster(_) => {
                ErrorKind::Resolution
            }
            Error::Precondition(_) => ErrorKind::Precondition,
            Error::Correlation { .. } => ErrorKind::Correlation,
            Error::Exec(_) => ErrorKind::Tunnel,
            Error::PortForward(e) if e.is_precondition() => ErrorKind::Precondition,
            Error::PortForward(_) => ErrorKind::Tunnel,
            Error::Format(_) | Error::Serialization(_) => ErrorKind::Format,
            Error::Kube(_) | Error::Kubeconfig(_) | Error::InferConfig(_) => ErrorKind::Api,
            Error::Redis(_) => ErrorKind::Redis,
        }
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(e)) => e.code == 404,
            other => other.kind() == ErrorKind::Resolution,
        }
    }

    /// Output captured before a command failed mid-stream, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Error::Exec(e) => e.captured_output(),
            _ => None,
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }
}

/// Result type alias for kuberc operations
pub type Result<T> = std::result::Result<T, Error>;
