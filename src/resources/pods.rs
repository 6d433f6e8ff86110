//! Pod registry: resolves workloads to exec/forward targets and maps pod
//! IPs reported by Redis back to pod identities.
//!
//! A [`PodRegistry`] is one session scoped to a namespace. Its IP index is
//! built by a single bulk listing the first time it is needed and is never
//! refreshed; create a new registry to observe membership changes.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// An addressable container inside a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Pod namespace.
    pub namespace: String,
    /// Pod name.
    pub name: String,
    /// Container to exec into. Defaults to the first container of the pod.
    pub container: Option<String>,
    /// Pod IP, once assigned.
    pub pod_ip: Option<String>,
    /// Node hosting the pod.
    pub node_name: Option<String>,
    /// Whether the pod phase is `Running`.
    pub running: bool,
}

impl Target {
    /// Build a target from a pod, checking the requested container exists.
    pub fn from_pod(pod: &Pod, container: Option<&str>) -> Result<Self> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default();

        let container = match container.filter(|c| !c.is_empty()) {
            Some(wanted) => {
                if !containers.iter().any(|c| c.name == wanted) {
                    return Err(Error::ContainerNotFound {
                        pod: name,
                        container: wanted.to_string(),
                    });
                }
                Some(wanted.to_string())
            }
            None => containers.first().map(|c| c.name.clone()),
        };

        let status = pod.status.as_ref();
        Ok(Target {
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            name,
            container,
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            running: status
                .and_then(|s| s.phase.as_deref())
                .is_some_and(|phase| phase == "Running"),
        })
    }

    /// The pod IP, failing when none has been assigned yet.
    pub fn ip(&self) -> Result<&str> {
        self.pod_ip
            .as_deref()
            .ok_or_else(|| Error::precondition(format!("pod {} has no IP address", self)))
    }

    /// Fail unless the pod is running.
    pub fn ensure_running(&self) -> Result<()> {
        if self.running {
            Ok(())
        } else {
            Err(Error::precondition(format!("pod {} is not running", self)))
        }
    }

    /// Replace the container when one is configured explicitly.
    pub fn with_container(mut self, container: Option<&str>) -> Self {
        if let Some(container) = container.filter(|c| !c.is_empty()) {
            self.container = Some(container.to_string());
        }
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Where pods are read from. Implemented for [`kube::Client`].
pub trait PodSource: Send + Sync {
    /// Get one pod, `None` when it does not exist.
    fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = std::result::Result<Option<Pod>, kube::Error>> + Send;

    /// List every pod in a namespace.
    fn list_pods(
        &self,
        namespace: &str,
    ) -> impl Future<Output = std::result::Result<Vec<Pod>, kube::Error>> + Send;
}

impl PodSource for Client {
    async fn get_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> std::result::Result<Option<Pod>, kube::Error> {
        let pods: Api<Pod> = Api::namespaced(self.clone(), namespace);
        pods.get_opt(name).await
    }

    async fn list_pods(&self, namespace: &str) -> std::result::Result<Vec<Pod>, kube::Error> {
        let pods: Api<Pod> = Api::namespaced(self.clone(), namespace);
        Ok(pods.list(&ListParams::default()).await?.items)
    }
}

/// Pod IP to pod identity mapping for one namespace.
#[derive(Debug, Clone, Default)]
pub struct PodIndex {
    namespace: String,
    by_ip: HashMap<String, Target>,
}

impl PodIndex {
    /// Build an index from already resolved targets.
    ///
    /// Targets without an IP are skipped. When several pods share an IP
    /// (host networking), the first one listed wins.
    pub fn from_targets(namespace: impl Into<String>, targets: impl IntoIterator<Item = Target>) -> Self {
        let mut by_ip = HashMap::new();
        for target in targets {
            if let Some(ip) = target.pod_ip.clone() {
                by_ip.entry(ip).or_insert(target);
            }
        }
        Self {
            namespace: namespace.into(),
            by_ip,
        }
    }

    /// Build an index from a pod listing.
    pub fn from_pods(namespace: impl Into<String>, pods: &[Pod]) -> Self {
        let targets = pods
            .iter()
            .filter(|pod| pod.metadata.name.is_some())
            .filter_map(|pod| Target::from_pod(pod, None).ok());
        Self::from_targets(namespace, targets)
    }

    /// Find the pod owning an IP.
    pub fn lookup(&self, ip: &str) -> Result<&Target> {
        self.by_ip.get(ip).ok_or_else(|| Error::Correlation {
            namespace: self.namespace.clone(),
            ip: ip.to_string(),
        })
    }

    /// Number of indexed pods.
    pub fn len(&self) -> usize {
        self.by_ip.len()
    }

    /// Check if no pod was indexed.
    pub fn is_empty(&self) -> bool {
        self.by_ip.is_empty()
    }
}

/// Namespace-scoped pod lookup session.
pub struct PodRegistry<S = Client> {
    source: S,
    namespace: String,
    index: OnceCell<PodIndex>,
}

impl<S: PodSource> PodRegistry<S> {
    /// Create a registry session for a namespace.
    pub fn new(source: S, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
            index: OnceCell::new(),
        }
    }

    /// Namespace this session is scoped to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolve a pod by name, optionally pinning a container.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn resolve(&self, name: &str, container: Option<&str>) -> Result<Target> {
        let pod = self
            .source
            .get_pod(&self.namespace, name)
            .await?
            .ok_or_else(|| Error::PodNotFound {
                namespace: self.namespace.clone(),
                name: name.to_string(),
            })?;
        Target::from_pod(&pod, container)
    }

    /// The IP index, listed once per session.
    ///
    /// Concurrent first callers wait on a single listing.
    pub async fn index(&self) -> Result<&PodIndex> {
        self.index
            .get_or_try_init(|| async {
                let pods = self.source.list_pods(&self.namespace).await?;
                let index = PodIndex::from_pods(&self.namespace, &pods);
                debug!(
                    namespace = %self.namespace,
                    pods = pods.len(),
                    indexed = index.len(),
                    "Built pod IP index"
                );
                Ok::<_, Error>(index)
            })
            .await
    }

    /// Find the pod owning an IP.
    pub async fn lookup_by_ip(&self, ip: &str) -> Result<Target> {
        Ok(self.index().await?.lookup(ip)?.clone())
    }
}
