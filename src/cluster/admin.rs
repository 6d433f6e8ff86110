//! Redis Cluster operations driven through the command tunnel.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::cli::{
    FailoverOptions, RebalanceOptions, RedisCli, add_node_subcommand, check_subcommand,
    create_subcommand, del_node_subcommand, join_args, shell_quote,
};
use crate::client::parsing::parse_cluster_slots;
use crate::client::topology::{ClusterTopology, SlotCoverage, SlotRange, correlate_slots};
use crate::client::types::{ClusterInfo, NodeRole, ParseError, parse_cluster_nodes};
use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::resources::exec::{CommandTunnel, ExecOptions, KubeTunnel};
use crate::resources::pods::{PodRegistry, PodSource, Target};

/// A resolved pod running redis-server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedisPod {
    pub target: Target,
    pub port: u16,
}

impl RedisPod {
    /// `ip:port` as seen by the other cluster members.
    pub fn address(&self) -> Result<String> {
        Ok(format!("{}:{}", self.target.ip()?, self.port))
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }
}

/// Output of one command, per pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodOutput {
    pub pod: String,
    pub output: String,
}

/// Slot ranges together with their coverage of the slot space.
#[derive(Debug, Clone, Serialize)]
pub struct SlotReport {
    pub ranges: Vec<SlotRange>,
    pub coverage: SlotCoverage,
}

/// Cluster operations for one namespace.
pub struct ClusterAdmin<T = KubeTunnel, S = kube::Client> {
    tunnel: T,
    registry: PodRegistry<S>,
    config: ClusterConfig,
}

impl<T: CommandTunnel, S: PodSource> ClusterAdmin<T, S> {
    pub fn new(tunnel: T, source: S, config: ClusterConfig) -> Self {
        let registry = PodRegistry::new(source, config.namespace.clone());
        Self {
            tunnel,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn registry(&self) -> &PodRegistry<S> {
        &self.registry
    }

    fn cli(&self) -> RedisCli<'_> {
        RedisCli::new(&self.config.cli, self.config.redis_port)
    }

    /// Resolve a pod by name.
    pub async fn pod(&self, name: &str) -> Result<RedisPod> {
        let target = self
            .registry
            .resolve(name, self.config.container.as_deref())
            .await?;
        Ok(RedisPod {
            target,
            port: self.config.redis_port,
        })
    }

    async fn run(&self, pod: &RedisPod, command: String, options: ExecOptions) -> Result<String> {
        Ok(self.tunnel.execute(&pod.target, &command, options).await?)
    }

    async fn local(&self, pod: &RedisPod, command: &str) -> Result<String> {
        self.run(pod, self.cli().local(command), ExecOptions::captured())
            .await
    }

    async fn local_raw(&self, pod: &RedisPod, command: &str) -> Result<String> {
        self.run(pod, self.cli().local_raw(command), ExecOptions::captured())
            .await
    }

    async fn cluster_tool(
        &self,
        pod: &RedisPod,
        subcommand: &str,
        options: ExecOptions,
    ) -> Result<String> {
        self.run(pod, self.cli().cluster(subcommand), options).await
    }

    /// `PING`
    pub async fn ping(&self, name: &str) -> Result<String> {
        let pod = self.pod(name).await?;
        self.local(&pod, "ping").await
    }

    /// Run an arbitrary command on one pod.
    #[instrument(skip(self))]
    pub async fn call(&self, name: &str, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(Error::precondition("no command given"));
        }
        let pod = self.pod(name).await?;
        self.local(&pod, &join_args(args)).await
    }

    /// Run an arbitrary command on every node of the cluster `name` belongs to.
    #[instrument(skip(self))]
    pub async fn call_all(&self, name: &str, args: &[String]) -> Result<Vec<PodOutput>> {
        if args.is_empty() {
            return Err(Error::precondition("no command given"));
        }
        let command = join_args(args);
        self.for_each_member(name, &command).await
    }

    /// `CONFIG GET <key>`
    pub async fn config_get(&self, name: &str, key: &str) -> Result<String> {
        let pod = self.pod(name).await?;
        self.local(&pod, &format!("config get {}", shell_quote(key)))
            .await
    }

    /// `CONFIG GET <key>` on every cluster member.
    pub async fn config_get_all(&self, name: &str, key: &str) -> Result<Vec<PodOutput>> {
        self.for_each_member(name, &format!("config get {}", shell_quote(key)))
            .await
    }

    /// `CONFIG SET <key> <value>`
    #[instrument(skip(self))]
    pub async fn config_set(&self, name: &str, key: &str, value: &str) -> Result<String> {
        let pod = self.pod(name).await?;
        self.local(&pod, &config_set_command(key, value)).await
    }

    /// `CONFIG SET <key> <value>` on every cluster member.
    #[instrument(skip(self))]
    pub async fn config_set_all(&self, name: &str, key: &str, value: &str) -> Result<Vec<PodOutput>> {
        self.for_each_member(name, &config_set_command(key, value))
            .await
    }

    async fn for_each_member(&self, name: &str, command: &str) -> Result<Vec<PodOutput>> {
        let topology = self.nodes(name).await?;
        let mut outputs = Vec::with_capacity(topology.len());
        for node in topology.nodes() {
            let pod = RedisPod {
                target: node
                    .pod
                    .clone()
                    .with_container(self.config.container.as_deref()),
                port: self.config.redis_port,
            };
            let output = self.local(&pod, command).await?;
            outputs.push(PodOutput {
                pod: pod.target.name,
                output,
            });
        }
        Ok(outputs)
    }

    /// `CLUSTER INFO`, parsed.
    pub async fn cluster_info(&self, name: &str) -> Result<ClusterInfo> {
        let pod = self.pod(name).await?;
        let output = self.local_raw(&pod, "cluster info").await?;
        Ok(ClusterInfo::parse(&output)?)
    }

    /// `CLUSTER MYID`
    pub async fn node_id(&self, pod: &RedisPod) -> Result<String> {
        let output = self.local_raw(pod, "cluster myid").await?;
        let id = output.trim();
        if id.is_empty() {
            return Err(ParseError::MissingField(format!("node id of {}", pod.target)).into());
        }
        Ok(id.to_string())
    }

    /// First line of `ROLE`.
    pub async fn role(&self, pod: &RedisPod) -> Result<NodeRole> {
        let output = self.local_raw(pod, "role").await?;
        Ok(NodeRole::from_role_reply(&output)?)
    }

    /// `CLUSTER NODES`, correlated with the pods in the namespace.
    #[instrument(skip(self))]
    pub async fn nodes(&self, name: &str) -> Result<ClusterTopology> {
        let pod = self.pod(name).await?;
        self.nodes_of(&pod).await
    }

    async fn nodes_of(&self, pod: &RedisPod) -> Result<ClusterTopology> {
        let output = self.local_raw(pod, "cluster nodes").await?;
        let nodes = parse_cluster_nodes(&output)?;
        let index = self.registry.index().await?;
        ClusterTopology::correlate(nodes, index)
    }

    /// `CLUSTER SLOTS`, correlated and checked for gaps and overlaps.
    #[instrument(skip(self))]
    pub async fn slots(&self, name: &str) -> Result<SlotReport> {
        let pod = self.pod(name).await?;
        let output = self.local_raw(&pod, "cluster slots").await?;
        let groups = parse_cluster_slots(&output)?;
        let index = self.registry.index().await?;
        let ranges = correlate_slots(groups, index)?;

        let coverage = SlotCoverage::of(ranges.iter().map(SlotRange::span));
        for gap in &coverage.gaps {
            warn!(slots = %gap, "Slots not served by any node");
        }
        for (a, b) in &coverage.overlaps {
            warn!(first = %a, second = %b, "Overlapping slot ranges");
        }
        Ok(SlotReport { ranges, coverage })
    }

    /// `--cluster create` across the given pods. Output is streamed live;
    /// stdin is wired for the confirmation prompt unless `yes` is set.
    #[instrument(skip(self))]
    pub async fn create(&self, names: &[String], replicas: u32, yes: bool) -> Result<()> {
        let mut pods = Vec::with_capacity(names.len());
        for name in names {
            let pod = self.pod(name).await?;
            pod.target.ensure_running()?;
            pods.push(pod);
        }
        let Some(entry) = pods.first() else {
            return Err(Error::precondition("no pods given"));
        };
        let addresses = pods
            .iter()
            .map(RedisPod::address)
            .collect::<Result<Vec<_>>>()?;

        info!(pods = names.len(), replicas, "Creating cluster");
        self.cluster_tool(
            entry,
            &create_subcommand(&addresses, replicas, yes),
            ExecOptions::interactive(!yes),
        )
        .await?;
        Ok(())
    }

    /// `--cluster add-node`, run from the existing pod.
    ///
    /// As a slave, the existing pod must be a master; the new node then
    /// replicates it.
    #[instrument(skip(self))]
    pub async fn add_node(&self, new: &str, existing: &str, slave: bool) -> Result<String> {
        let new_pod = self.pod(new).await?;
        let existing_pod = self.pod(existing).await?;

        let master_id = if slave {
            if self.role(&existing_pod).await? != NodeRole::Master {
                return Err(Error::precondition(format!(
                    "{} is not master, can't add slave for it",
                    existing
                )));
            }
            Some(self.node_id(&existing_pod).await?)
        } else {
            None
        };

        let subcommand = add_node_subcommand(
            &new_pod.address()?,
            &existing_pod.address()?,
            master_id.as_deref(),
        );
        self.cluster_tool(&existing_pod, &subcommand, ExecOptions::captured())
            .await
    }

    /// `--cluster del-node`, sent through `entry` when given, otherwise
    /// through the pod being removed.
    #[instrument(skip(self))]
    pub async fn del_node(&self, name: &str, entry: Option<&str>) -> Result<String> {
        let pod = self.pod(name).await?;
        let node_id = self.node_id(&pod).await?;
        let entry_pod = match entry {
            Some(entry) => self.pod(entry).await?,
            None => pod,
        };
        let subcommand = del_node_subcommand(&entry_pod.address()?, &node_id);
        self.cluster_tool(&entry_pod, &subcommand, ExecOptions::captured())
            .await
    }

    /// `CLUSTER FAILOVER` on a replica.
    #[instrument(skip(self))]
    pub async fn failover(&self, name: &str, options: FailoverOptions) -> Result<String> {
        options.validate()?;
        let pod = self.pod(name).await?;
        if self.role(&pod).await? == NodeRole::Master {
            return Err(Error::precondition(format!(
                "can't do failover on master node {}",
                name
            )));
        }
        self.local(&pod, &options.command()).await
    }

    /// `--cluster rebalance`, streamed live.
    ///
    /// Options are validated before anything runs in the cluster; weights
    /// name pods and are mapped to node ids through the correlated topology.
    #[instrument(skip(self, options))]
    pub async fn rebalance(&self, name: &str, options: &RebalanceOptions) -> Result<()> {
        options.validate()?;
        let pod = self.pod(name).await?;

        let node_weights = if options.weights.is_empty() {
            Vec::new()
        } else {
            let topology = self.nodes_of(&pod).await?;
            options
                .weights
                .iter()
                .map(|(pod_name, weight)| {
                    topology
                        .find_by_pod(pod_name)
                        .map(|n| (n.node.node_id.clone(), weight.clone()))
                        .ok_or_else(|| Error::NotInCluster(pod_name.clone()))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let subcommand = options.subcommand(&pod.address()?, &node_weights);
        debug!(subcommand, "Rebalancing cluster");
        self.cluster_tool(&pod, &subcommand, ExecOptions::interactive(false))
            .await?;
        Ok(())
    }

    /// `--cluster check`
    pub async fn check(&self, name: &str) -> Result<String> {
        let pod = self.pod(name).await?;
        self.cluster_tool(&pod, &check_subcommand(&pod.address()?), ExecOptions::captured())
            .await
    }
}

fn config_set_command(key: &str, value: &str) -> String {
    format!("config set {} {}", shell_quote(key), shell_quote(value))
}
