//! Explicit configuration for cluster and sentinel operations.
//!
//! Values come from command-line flags in the binary and are threaded
//! through each operation; nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use crate::error::Result;

/// Default Redis server port.
pub const DEFAULT_REDIS_PORT: u16 = 6379;
/// Default Sentinel port.
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;
/// Default command-line tool run inside the pods.
pub const DEFAULT_CLI: &str = "redis-cli";

/// Where the Kubernetes client configuration comes from.
#[derive(Debug, Clone, Default)]
pub struct KubeConfigSource {
    /// Explicit kubeconfig file. Falls back to the usual discovery when unset.
    pub kubeconfig: Option<PathBuf>,
    /// Context to use from the kubeconfig.
    pub context: Option<String>,
}

impl KubeConfigSource {
    /// Build a Kubernetes client.
    ///
    /// An explicit path is read as is; otherwise `KUBECONFIG`, the default
    /// kubeconfig and the in-cluster environment are tried in turn.
    pub async fn client(&self) -> Result<Client> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };
        let config = match &self.kubeconfig {
            Some(path) => {
                debug!(path = %path.display(), "Loading kubeconfig");
                let kubeconfig = Kubeconfig::read_from(path)?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
            None if self.context.is_some() => kube::Config::from_kubeconfig(&options).await?,
            None => kube::Config::infer().await?,
        };
        Ok(Client::try_from(config)?)
    }
}

/// Settings for the `fred` wire clients.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub connection_timeout: Duration,
    pub command_timeout: Duration,
    pub password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            password: None,
        }
    }
}

impl ClientConfig {
    /// Set password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Settings for Redis Cluster operations.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Namespace the cluster pods live in.
    pub namespace: String,
    /// Port redis-server listens on inside each pod.
    pub redis_port: u16,
    /// Container running redis-server. First container when unset.
    pub container: Option<String>,
    /// Command-line tool invoked inside the container.
    pub cli: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            redis_port: DEFAULT_REDIS_PORT,
            container: None,
            cli: DEFAULT_CLI.to_string(),
        }
    }
}

impl ClusterConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_redis_port(mut self, port: u16) -> Self {
        self.redis_port = port;
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_cli(mut self, cli: impl Into<String>) -> Self {
        self.cli = cli.into();
        self
    }
}

/// Settings for Sentinel operations.
#[derive(Clone, Debug)]
pub struct SentinelConfig {
    /// Namespace the sentinel and redis pods live in.
    pub namespace: String,
    /// Port sentinel listens on inside its pod.
    pub sentinel_port: u16,
    /// Port redis-server listens on inside each pod.
    pub redis_port: u16,
    /// Container running sentinel. First container when unset.
    pub sentinel_container: Option<String>,
    /// Container running redis-server. First container when unset.
    pub redis_container: Option<String>,
    /// Local port for the sentinel forward; 0 picks an ephemeral port.
    pub local_port: u16,
    /// Command-line tool invoked inside redis containers.
    pub cli: String,
    /// Wire client settings.
    pub client: ClientConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            sentinel_port: DEFAULT_SENTINEL_PORT,
            redis_port: DEFAULT_REDIS_PORT,
            sentinel_container: None,
            redis_container: None,
            local_port: 0,
            cli: DEFAULT_CLI.to_string(),
            client: ClientConfig::default(),
        }
    }
}

impl SentinelConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_sentinel_port(mut self, port: u16) -> Self {
        self.sentinel_port = port;
        self
    }

    pub fn with_redis_port(mut self, port: u16) -> Self {
        self.redis_port = port;
        self
    }

    pub fn with_sentinel_container(mut self, container: impl Into<String>) -> Self {
        self.sentinel_container = Some(container.into());
        self
    }

    pub fn with_redis_container(mut self, container: impl Into<String>) -> Self {
        self.redis_container = Some(container.into());
        self
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    pub fn with_cli(mut self, cli: impl Into<String>) -> Self {
        self.cli = cli.into();
        self
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Settings for running redis-cli against the data pods.
    pub fn redis_cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            namespace: self.namespace.clone(),
            redis_port: self.redis_port,
            container: self.redis_container.clone(),
            cli: self.cli.clone(),
        }
    }
}
