//! Command lines for the `redis-cli` tool running inside the pods.
//!
//! Everything here only builds strings; nothing touches the cluster.

use serde::Serialize;

use crate::error::{Error, Result};

/// Minimum rebalance migration timeout, in milliseconds.
pub const MIN_REBALANCE_TIMEOUT_MS: u64 = 2000;

/// Builds `redis-cli` invocations against the server in the same pod.
#[derive(Debug, Clone, Copy)]
pub struct RedisCli<'a> {
    cli: &'a str,
    port: u16,
}

impl<'a> RedisCli<'a> {
    pub fn new(cli: &'a str, port: u16) -> Self {
        Self { cli, port }
    }

    /// `<cli> -c -h 127.0.0.1 -p <port> <command>`
    pub fn local(&self, command: &str) -> String {
        format!("{} -c -h 127.0.0.1 -p {} {}", self.cli, self.port, command)
    }

    /// Like [`RedisCli::local`] with `--raw`, for machine-read replies.
    pub fn local_raw(&self, command: &str) -> String {
        format!("{} -c --raw -h 127.0.0.1 -p {} {}", self.cli, self.port, command)
    }

    /// `<cli> -h 127.0.0.1 -p <port> <command>`, without cluster redirects.
    pub fn standalone(&self, command: &str) -> String {
        format!("{} -h 127.0.0.1 -p {} {}", self.cli, self.port, command)
    }

    /// `<cli> --cluster <subcommand>`
    pub fn cluster(&self, subcommand: &str) -> String {
        format!("{} --cluster {}", self.cli, subcommand)
    }
}

/// Quote one argument for `sh -c`.
///
/// Plain words pass through; anything else is single-quoted.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_.:/=@,+%".contains(&b));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Quote and join arguments.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `create <addr>... --cluster-replicas N [--cluster-yes]`
pub fn create_subcommand(addresses: &[String], replicas: u32, yes: bool) -> String {
    let mut cmd = format!(
        "create {} --cluster-replicas {}",
        addresses.join(" "),
        replicas
    );
    if yes {
        cmd.push_str(" --cluster-yes");
    }
    cmd
}

/// `add-node <new> <existing> [--cluster-slave --cluster-master-id <id>]`
pub fn add_node_subcommand(new: &str, existing: &str, master_id: Option<&str>) -> String {
    let mut cmd = format!("add-node {} {}", new, existing);
    if let Some(id) = master_id {
        cmd.push_str(&format!(" --cluster-slave --cluster-master-id {}", id));
    }
    cmd
}

/// `del-node <entry> <node-id>`
pub fn del_node_subcommand(entry: &str, node_id: &str) -> String {
    format!("del-node {} {}", entry, node_id)
}

/// `check <addr>`
pub fn check_subcommand(address: &str) -> String {
    format!("check {}", address)
}

/// Flags for `CLUSTER FAILOVER`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailoverOptions {
    /// Skip the handshake with the master.
    pub force: bool,
    /// Skip cluster consensus.
    pub takeover: bool,
}

impl FailoverOptions {
    /// Reject force and takeover together.
    pub fn validate(&self) -> Result<()> {
        if self.force && self.takeover {
            return Err(Error::precondition(
                "force and takeover can't be passed at the same time during failover",
            ));
        }
        Ok(())
    }

    /// `cluster failover [force|takeover]`
    pub fn command(&self) -> String {
        let mut cmd = "cluster failover".to_string();
        if self.force {
            cmd.push_str(" force");
        }
        if self.takeover {
            cmd.push_str(" takeover");
        }
        cmd
    }
}

/// Flags for `--cluster rebalance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebalanceOptions {
    /// `(pod name, weight)` pairs, resolved to node ids before running.
    pub weights: Vec<(String, String)>,
    pub use_empty_masters: bool,
    /// Migration timeout per batch, in milliseconds.
    pub timeout_ms: i64,
    /// Dry run.
    pub simulate: bool,
    /// Keys migrated per batch.
    pub pipeline: i64,
    /// Rebalance only when the slot imbalance percentage exceeds this.
    pub threshold: i64,
    /// Overwrite existing keys on the target node.
    pub replace: bool,
}

impl Default for RebalanceOptions {
    fn default() -> Self {
        Self {
            weights: Vec::new(),
            use_empty_masters: false,
            timeout_ms: 60000,
            simulate: false,
            pipeline: 10,
            threshold: 2,
            replace: false,
        }
    }
}

impl RebalanceOptions {
    /// Parse `pod=weight[,pod=weight...]`.
    pub fn parse_weights(spec: &str) -> Result<Vec<(String, String)>> {
        spec.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((pod, weight)) if !pod.is_empty() && !weight.is_empty() => {
                    Ok((pod.to_string(), weight.to_string()))
                }
                _ => Err(Error::precondition(format!(
                    "invalid weight {:?}, expected pod=weight",
                    pair
                ))),
            })
            .collect()
    }

    /// Check the numeric limits.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms <= MIN_REBALANCE_TIMEOUT_MS as i64 {
            return Err(Error::precondition(format!(
                "timeout must > {} ms for safety",
                MIN_REBALANCE_TIMEOUT_MS
            )));
        }
        if self.pipeline <= 0 {
            return Err(Error::precondition("pipeline size must > 0"));
        }
        if self.threshold <= 0 {
            return Err(Error::precondition("threshold must > 0"));
        }
        Ok(())
    }

    /// `rebalance <addr> ...` with weights already mapped to node ids.
    pub fn subcommand(&self, address: &str, node_weights: &[(String, String)]) -> String {
        let mut cmd = format!("rebalance {}", address);
        if !node_weights.is_empty() {
            let weights = node_weights
                .iter()
                .map(|(id, w)| shell_quote(&format!("{}={}", id, w)))
                .collect::<Vec<_>>()
                .join(" ");
            cmd.push_str(&format!(" --cluster-weight {}", weights));
        }
        if self.use_empty_masters {
            cmd.push_str(" --cluster-use-empty-masters");
        }
        cmd.push_str(&format!(" --cluster-timeout {}", self.timeout_ms));
        if self.simulate {
            cmd.push_str(" --cluster-simulate");
        }
        cmd.push_str(&format!(" --cluster-pipeline {}", self.pipeline));
        cmd.push_str(&format!(" --cluster-threshold {}", self.threshold));
        if self.replace {
            cmd.push_str(" --cluster-replace");
        }
        cmd
    }
}
