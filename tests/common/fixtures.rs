//! Builders for Pod fixtures and canned redis replies.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kuberc::resources::Target;

/// Builder for Pod test fixtures.
///
/// # Example
/// ```
/// let pod = PodBuilder::new("rc-0")
///     .namespace("redis")
///     .ip("10.0.0.1")
///     .container("redis")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct PodBuilder {
    name: String,
    namespace: String,
    ip: Option<String>,
    containers: Vec<String>,
    phase: String,
    node_name: Option<String>,
}

impl PodBuilder {
    /// A running pod named `name` in namespace `redis` with one `redis`
    /// container.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "redis".to_string(),
            ip: None,
            containers: vec!["redis".to_string()],
            phase: "Running".to_string(),
            node_name: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Replace the containers with the given names, in order.
    pub fn containers(mut self, names: &[&str]) -> Self {
        self.containers = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    pub fn node_name(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    pub fn build(self) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: self
                    .containers
                    .into_iter()
                    .map(|name| Container {
                        name,
                        ..Default::default()
                    })
                    .collect(),
                node_name: self.node_name,
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(self.phase),
                pod_ip: self.ip,
                ..Default::default()
            }),
        }
    }

    /// The [`Target`] this pod resolves to with its default container.
    pub fn target(self) -> Target {
        Target::from_pod(&self.build(), None).expect("fixture pod is valid")
    }
}

/// Pods `rc-0`..`rc-5` with IPs `10.0.0.1`..`10.0.0.6`.
pub fn cluster_pods() -> Vec<Pod> {
    (0..6)
        .map(|i| {
            PodBuilder::new(format!("rc-{}", i))
                .ip(format!("10.0.0.{}", i + 1))
                .build()
        })
        .collect()
}

/// Node id of `rc-<i>` in [`CLUSTER_NODES`].
pub fn node_id(i: usize) -> String {
    format!("{:040x}", i + 1)
}

/// Three masters (`rc-0`..`rc-2`) each with one replica (`rc-3`..`rc-5`).
pub const CLUSTER_NODES: &str = "\
0000000000000000000000000000000000000001 10.0.0.1:6379@16379 myself,master - 0 0 1 connected 0-5460
0000000000000000000000000000000000000002 10.0.0.2:6379@16379 master - 0 1700000000000 2 connected 5461-10922
0000000000000000000000000000000000000003 10.0.0.3:6379@16379 master - 0 1700000000000 3 connected 10923-16383
0000000000000000000000000000000000000004 10.0.0.4:6379@16379 slave 0000000000000000000000000000000000000001 0 1700000000000 1 connected
0000000000000000000000000000000000000005 10.0.0.5:6379@16379 slave 0000000000000000000000000000000000000002 0 1700000000000 2 connected
0000000000000000000000000000000000000006 10.0.0.6:6379@16379 slave 0000000000000000000000000000000000000003 0 1700000000000 3 connected
";

/// `CLUSTER SLOTS --raw` for [`CLUSTER_NODES`].
pub const CLUSTER_SLOTS: &str = "\
0
5460
10.0.0.1
6379
0000000000000000000000000000000000000001
10.0.0.4
6379
0000000000000000000000000000000000000004
5461
10922
10.0.0.2
6379
0000000000000000000000000000000000000002
10.0.0.5
6379
0000000000000000000000000000000000000005
10923
16383
10.0.0.3
6379
0000000000000000000000000000000000000003
10.0.0.6
6379
0000000000000000000000000000000000000006
";

pub const INFO_MASTER: &str = "# Replication\r\nrole:master\r\nconnected_slaves:1\r\nmaster_repl_offset:1024\r\n";

pub const INFO_SLAVE: &str = "# Replication\r\nrole:slave\r\nmaster_host:10.0.0.1\r\nmaster_port:6379\r\nmaster_link_status:up\r\nmaster_last_io_seconds_ago:4\r\nmaster_sync_in_progress:0\r\nslave_repl_offset:1024\r\nmaster_repl_offset:1024\r\n";
