//! Cluster topology correlated with the pods that host each node.
//!
//! Parsed replies only carry IPs. Every node and slot owner is resolved
//! against the namespace [`PodIndex`]; an IP without a pod fails the whole
//! correlation instead of leaving a hole in the topology.

use serde::Serialize;

use super::parsing::{SlotEndpoint, SlotGroup};
use super::types::{ClusterNode, SlotSpan, TOTAL_SLOTS};
use crate::error::Result;
use crate::resources::pods::{PodIndex, Target};

/// A cluster node and the pod it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelatedNode {
    #[serde(flatten)]
    pub node: ClusterNode,
    pub pod: Target,
}

/// All nodes of a cluster, in `CLUSTER NODES` order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ClusterTopology {
    nodes: Vec<CorrelatedNode>,
}

/// A master followed by its replicas.
#[derive(Debug, Clone, Serialize)]
pub struct NodeGroup<'a> {
    pub master: &'a CorrelatedNode,
    pub replicas: Vec<&'a CorrelatedNode>,
}

impl ClusterTopology {
    /// Attach a pod to every node.
    pub fn correlate(nodes: Vec<ClusterNode>, index: &PodIndex) -> Result<Self> {
        let nodes = nodes
            .into_iter()
            .map(|node| {
                let pod = index.lookup(&node.ip)?.clone();
                Ok(CorrelatedNode { node, pod })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[CorrelatedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Master nodes.
    pub fn masters(&self) -> impl Iterator<Item = &CorrelatedNode> {
        self.nodes.iter().filter(|n| n.node.is_master())
    }

    /// Replicas of a master, by master node id.
    pub fn replicas_of<'a>(&'a self, master_id: &'a str) -> impl Iterator<Item = &'a CorrelatedNode> {
        self.nodes
            .iter()
            .filter(move |n| n.node.master_id.as_deref() == Some(master_id))
    }

    /// Node by node id.
    pub fn get_node(&self, node_id: &str) -> Option<&CorrelatedNode> {
        self.nodes.iter().find(|n| n.node.node_id == node_id)
    }

    /// Node hosted by the named pod.
    pub fn find_by_pod(&self, pod_name: &str) -> Option<&CorrelatedNode> {
        self.nodes.iter().find(|n| n.pod.name == pod_name)
    }

    /// Masters with their replicas attached.
    ///
    /// Replicas whose master is not in the listing are left out.
    pub fn groups(&self) -> Vec<NodeGroup<'_>> {
        self.masters()
            .map(|master| NodeGroup {
                master,
                replicas: self.replicas_of(&master.node.node_id).collect(),
            })
            .collect()
    }

    /// Total slots assigned across masters.
    pub fn assigned_slots(&self) -> u32 {
        self.masters().map(|n| n.node.slot_count()).sum()
    }
}

/// One endpoint of a slot range and its pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotOwner {
    pub ip: String,
    pub port: u16,
    pub node_id: String,
    pub pod: Target,
}

impl SlotOwner {
    fn correlate(endpoint: SlotEndpoint, index: &PodIndex) -> Result<Self> {
        let pod = index.lookup(&endpoint.ip)?.clone();
        Ok(SlotOwner {
            ip: endpoint.ip,
            port: endpoint.port,
            node_id: endpoint.node_id,
            pod,
        })
    }
}

/// A contiguous slot range with exactly one master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
    pub master: SlotOwner,
    pub replicas: Vec<SlotOwner>,
}

impl SlotRange {
    pub fn span(&self) -> SlotSpan {
        SlotSpan::new(self.start, self.end)
    }

    pub fn count(&self) -> u32 {
        self.span().count()
    }
}

/// Resolve every slot group's master and replicas to pods.
///
/// The result is sorted by range start.
pub fn correlate_slots(groups: Vec<SlotGroup>, index: &PodIndex) -> Result<Vec<SlotRange>> {
    let mut ranges = groups
        .into_iter()
        .map(|group| {
            Ok(SlotRange {
                start: group.span.start,
                end: group.span.end,
                master: SlotOwner::correlate(group.master, index)?,
                replicas: group
                    .replicas
                    .into_iter()
                    .map(|r| SlotOwner::correlate(r, index))
                    .collect::<Result<Vec<_>>>()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ranges.sort_by_key(|r| (r.start, r.end));
    Ok(ranges)
}

/// How a set of ranges covers the slot space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotCoverage {
    /// Slots owned by no range.
    pub gaps: Vec<SlotSpan>,
    /// Pairs of ranges that share slots.
    pub overlaps: Vec<(SlotSpan, SlotSpan)>,
}

impl SlotCoverage {
    /// Compute gaps and overlaps over `0..16384`.
    pub fn of(spans: impl IntoIterator<Item = SlotSpan>) -> Self {
        let mut spans: Vec<SlotSpan> = spans.into_iter().collect();
        spans.sort_by_key(|s| (s.start, s.end));

        let mut coverage = SlotCoverage::default();
        let mut next: u32 = 0;
        let mut widest: Option<SlotSpan> = None;

        for span in spans {
            let start = u32::from(span.start);
            if start > next {
                coverage.gaps.push(gap(next, start - 1));
            }
            if let Some(prev) = widest
                && prev.overlaps(&span)
            {
                coverage.overlaps.push((prev, span));
            }
            let end = u32::from(span.end) + 1;
            if end > next {
                next = end;
                widest = Some(span);
            }
        }

        if next < u32::from(TOTAL_SLOTS) {
            coverage.gaps.push(gap(next, u32::from(TOTAL_SLOTS) - 1));
        }
        coverage
    }

    /// No gaps and no overlaps.
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty() && self.overlaps.is_empty()
    }

    /// Number of unowned slots.
    pub fn missing_slots(&self) -> u32 {
        self.gaps.iter().map(SlotSpan::count).sum()
    }
}

fn gap(start: u32, end: u32) -> SlotSpan {
    // both bounds are below TOTAL_SLOTS here
    SlotSpan::new(
        u16::try_from(start).unwrap_or(u16::MAX),
        u16::try_from(end).unwrap_or(u16::MAX),
    )
}
