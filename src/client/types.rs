//! Types for parsed Redis cluster information.
//!
//! These types represent the parsed output of `CLUSTER NODES` and
//! `CLUSTER INFO` as printed by `redis-cli` inside a pod.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Total number of hash slots in a Redis cluster.
pub const TOTAL_SLOTS: u16 = 16384;

/// Errors that can occur when parsing protocol replies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid cluster info format: {0}")]
    InvalidClusterInfo(String),
    #[error("Invalid cluster nodes format: {0}")]
    InvalidClusterNodes(String),
    #[error("Invalid slot range: {0}")]
    InvalidSlotRange(String),
    #[error("Invalid cluster slots format: {0}")]
    InvalidClusterSlots(String),
    #[error("Invalid sentinel reply: {0}")]
    InvalidSentinelReply(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// State of the Redis cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    /// Cluster is healthy and serving requests.
    Ok,
    /// Cluster is in a failed state.
    Fail,
}

impl FromStr for ClusterState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ok" => Ok(ClusterState::Ok),
            "fail" => Ok(ClusterState::Fail),
            _ => Err(ParseError::InvalidClusterInfo(format!(
                "Unknown cluster state: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterState::Ok => write!(f, "ok"),
            ClusterState::Fail => write!(f, "fail"),
        }
    }
}

/// Parsed output of `CLUSTER INFO`.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    /// Current state of the cluster.
    pub state: ClusterState,
    /// Number of hash slots assigned.
    pub slots_assigned: u32,
    /// Number of hash slots that are OK (served by nodes).
    pub slots_ok: u32,
    /// Number of hash slots in PFAIL state.
    pub slots_pfail: u32,
    /// Number of hash slots in FAIL state.
    pub slots_fail: u32,
    /// Total number of known nodes in the cluster.
    pub known_nodes: u32,
    /// Number of masters serving at least one slot.
    pub cluster_size: u32,
    /// Current cluster epoch.
    pub current_epoch: u64,
    /// Epoch of the answering node.
    pub my_epoch: u64,
    /// All raw key-value pairs from the info output.
    #[serde(skip)]
    pub raw: HashMap<String, String>,
}

impl ClusterInfo {
    /// Parse the output of `CLUSTER INFO`.
    pub fn parse(info: &str) -> Result<Self, ParseError> {
        let raw = super::parsing::parse_info_output(info);

        let state = raw
            .get("cluster_state")
            .ok_or_else(|| ParseError::MissingField("cluster_state".to_string()))?
            .parse()?;

        fn field<T: FromStr>(raw: &HashMap<String, String>, key: &str) -> Result<T, ParseError> {
            raw.get(key)
                .ok_or_else(|| ParseError::MissingField(key.to_string()))?
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidClusterInfo(format!("Invalid {} value", key)))
        }

        Ok(ClusterInfo {
            state,
            slots_assigned: field(&raw, "cluster_slots_assigned")?,
            slots_ok: field(&raw, "cluster_slots_ok")?,
            slots_pfail: field(&raw, "cluster_slots_pfail")?,
            slots_fail: field(&raw, "cluster_slots_fail")?,
            known_nodes: field(&raw, "cluster_known_nodes")?,
            cluster_size: field(&raw, "cluster_size")?,
            current_epoch: field(&raw, "cluster_current_epoch")?,
            my_epoch: field(&raw, "cluster_my_epoch")?,
            raw,
        })
    }

    /// Check if all slots are assigned.
    pub fn all_slots_assigned(&self) -> bool {
        self.slots_assigned == u32::from(TOTAL_SLOTS)
    }

    /// Check if the cluster is healthy.
    pub fn is_healthy(&self) -> bool {
        self.state == ClusterState::Ok && self.slots_fail == 0 && self.slots_pfail == 0
    }
}

/// Role of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Node is a master serving hash slots.
    Master,
    /// Node is a replica of a master.
    Slave,
}

impl NodeRole {
    /// Parse the first line of a `ROLE` reply.
    pub fn from_role_reply(reply: &str) -> Result<Self, ParseError> {
        match reply.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some("master") => Ok(NodeRole::Master),
            Some("slave") | Some("replica") => Ok(NodeRole::Slave),
            other => Err(ParseError::MissingField(format!(
                "role (got {:?})",
                other.unwrap_or_default()
            ))),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Master => write!(f, "master"),
            NodeRole::Slave => write!(f, "slave"),
        }
    }
}

/// The comma-joined flag set of a `CLUSTER NODES` line.
///
/// Flags are kept verbatim and in reply order so unknown tags
/// (`nofailover`, future additions) survive a format round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NodeFlags(Vec<String>);

impl NodeFlags {
    /// Parse flags from the `CLUSTER NODES` output.
    pub fn parse(flags_str: &str) -> Self {
        NodeFlags(
            flags_str
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Check whether a tag is present.
    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    /// Iterate over the tags in reply order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Get the role based on flags.
    pub fn role(&self) -> NodeRole {
        if self.contains("master") {
            NodeRole::Master
        } else {
            NodeRole::Slave
        }
    }

    /// Check if the node is healthy (not failing, handshaking or address-less).
    pub fn is_healthy(&self) -> bool {
        !["fail", "fail?", "pfail", "handshake", "noaddr"]
            .iter()
            .any(|f| self.contains(f))
    }
}

impl fmt::Display for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "noflags");
        }
        write!(f, "{}", self.0.join(","))
    }
}

/// A contiguous range of hash slots `[start, end]`, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SlotSpan {
    /// Start of the range (inclusive).
    pub start: u16,
    /// End of the range (inclusive).
    pub end: u16,
}

impl SlotSpan {
    /// Create a new slot range.
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Create a single-slot range.
    pub fn single(slot: u16) -> Self {
        Self {
            start: slot,
            end: slot,
        }
    }

    /// Number of slots in this range.
    pub fn count(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    /// Check if this range contains a specific slot.
    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    /// Check if two ranges share at least one slot.
    pub fn overlaps(&self, other: &SlotSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Parse a slot range from string (e.g., "0-5460" or "5461").
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();

        let span = if let Some((start_str, end_str)) = s.split_once('-') {
            SlotSpan::new(parse_slot(start_str)?, parse_slot(end_str)?)
        } else {
            SlotSpan::single(parse_slot(s)?)
        };

        if span.start > span.end {
            return Err(ParseError::InvalidSlotRange(format!(
                "start after end: {}",
                s
            )));
        }
        Ok(span)
    }
}

/// Parse one slot number, rejecting values outside the slot space.
pub(crate) fn parse_slot(s: &str) -> Result<u16, ParseError> {
    match s.trim().parse::<u16>() {
        Ok(slot) if slot < TOTAL_SLOTS => Ok(slot),
        _ => Err(ParseError::InvalidSlotRange(format!("Invalid slot: {}", s))),
    }
}

impl fmt::Display for SlotSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Sum of slot counts over a set of ranges.
pub fn slot_count(spans: &[SlotSpan]) -> u32 {
    spans.iter().map(SlotSpan::count).sum()
}

/// A cluster node as reported by one line of `CLUSTER NODES`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    /// Unique node ID (40 hex characters).
    pub node_id: String,
    /// IP address only.
    pub ip: String,
    /// Client port.
    pub port: u16,
    /// Cluster bus port.
    pub cluster_bus_port: u16,
    /// Announced hostname, when the address field carries one.
    pub hostname: Option<String>,
    /// Node flags.
    pub flags: NodeFlags,
    /// Master node ID if this is a replica, `None` when the field is `-`.
    pub master_id: Option<String>,
    /// Ping sent timestamp.
    pub ping_sent: u64,
    /// Pong received timestamp.
    pub pong_recv: u64,
    /// Config epoch.
    pub config_epoch: u64,
    /// Link state ("connected" or "disconnected").
    pub link_state: String,
    /// Slot ranges owned by this node (masters only), in reply order.
    pub slots: Vec<SlotSpan>,
    /// Importing/migrating markers such as `[93->-e7d1ee...]`, verbatim.
    pub migrating: Vec<String>,
}

impl ClusterNode {
    /// Get the role of this node.
    pub fn role(&self) -> NodeRole {
        self.flags.role()
    }

    /// Check if this is a master node.
    pub fn is_master(&self) -> bool {
        self.flags.contains("master")
    }

    /// Check if this is a replica node.
    pub fn is_replica(&self) -> bool {
        self.flags.contains("slave")
    }

    /// Check if this is the node that answered the query.
    pub fn is_myself(&self) -> bool {
        self.flags.contains("myself")
    }

    /// Check if the node is connected.
    pub fn is_connected(&self) -> bool {
        self.link_state == "connected"
    }

    /// Check if the node is healthy.
    pub fn is_healthy(&self) -> bool {
        self.flags.is_healthy() && self.is_connected()
    }

    /// `ip:port` of the node's client listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Total number of slots owned by this node.
    pub fn slot_count(&self) -> u32 {
        slot_count(&self.slots)
    }

    /// Parse a single line from `CLUSTER NODES` output.
    ///
    /// Fields are positional: id, `ip:port@cport[,hostname]`, flags,
    /// master id, ping-sent, pong-recv, config-epoch, link-state and
    /// trailing slot tokens.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let mut fields = line.split_whitespace();
        let mut next = |name: &str| {
            fields.next().ok_or_else(|| {
                ParseError::InvalidClusterNodes(format!("missing {} in line: {}", name, line))
            })
        };

        let node_id = next("node id")?.to_string();
        let address = next("address")?;
        let flags = NodeFlags::parse(next("flags")?);
        let master_id = match next("master id")? {
            "-" => None,
            id => Some(id.to_string()),
        };
        let ping_sent = parse_number(next("ping-sent")?, "ping-sent", line)?;
        let pong_recv = parse_number(next("pong-recv")?, "pong-recv", line)?;
        let config_epoch = parse_number(next("config-epoch")?, "config-epoch", line)?;
        let link_state = next("link-state")?.to_string();

        let (ip, port, cluster_bus_port, hostname) = parse_address(address)?;

        let mut slots = Vec::new();
        let mut migrating = Vec::new();
        for token in fields {
            if token.starts_with('[') {
                migrating.push(token.to_string());
            } else {
                slots.push(SlotSpan::parse(token)?);
            }
        }

        Ok(ClusterNode {
            node_id,
            ip,
            port,
            cluster_bus_port,
            hostname,
            flags,
            master_id,
            ping_sent,
            pong_recv,
            config_epoch,
            link_state,
            slots,
            migrating,
        })
    }
}

fn parse_number(value: &str, name: &str, line: &str) -> Result<u64, ParseError> {
    value.parse().map_err(|_| {
        ParseError::InvalidClusterNodes(format!("invalid {} {:?} in line: {}", name, value, line))
    })
}

/// Split `ip:port@cport[,hostname]` into its parts.
fn parse_address(address: &str) -> Result<(String, u16, u16, Option<String>), ParseError> {
    let invalid = || ParseError::InvalidClusterNodes(format!("Invalid address format: {}", address));

    let (ip_port, bus) = match address.split_once('@') {
        Some((ip_port, bus)) => (ip_port, Some(bus)),
        None => (address, None),
    };
    let (ip, port_str) = ip_port.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port_str.parse().map_err(|_| invalid())?;

    let (cluster_bus_port, hostname) = match bus {
        Some(bus) => {
            let (bus_port, hostname) = match bus.split_once(',') {
                Some((p, h)) if !h.is_empty() => (p, Some(h.to_string())),
                Some((p, _)) => (p, None),
                None => (bus, None),
            };
            (bus_port.parse().map_err(|_| invalid())?, hostname)
        }
        None => (port.checked_add(10000).ok_or_else(invalid)?, None),
    };

    Ok((ip.to_string(), port, cluster_bus_port, hostname))
}

/// Formats the node back into `CLUSTER NODES` line syntax.
impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}@{}", self.node_id, self.ip, self.port, self.cluster_bus_port)?;
        if let Some(hostname) = &self.hostname {
            write!(f, ",{}", hostname)?;
        }
        write!(
            f,
            " {} {} {} {} {} {}",
            self.flags,
            self.master_id.as_deref().unwrap_or("-"),
            self.ping_sent,
            self.pong_recv,
            self.config_epoch,
            self.link_state
        )?;
        for span in &self.slots {
            write!(f, " {}", span)?;
        }
        for marker in &self.migrating {
            write!(f, " {}", marker)?;
        }
        Ok(())
    }
}

/// Parse every non-empty line of `CLUSTER NODES`.
///
/// Parsing is all-or-nothing: one malformed line fails the whole reply.
pub fn parse_cluster_nodes(output: &str) -> Result<Vec<ClusterNode>, ParseError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(ClusterNode::parse_line)
        .collect()
}
