//! Protocol replies and wire clients.
//!
//! Replies are read either as `redis-cli` text through the command tunnel
//! or over a wire connection through a port-forward. This module turns
//! both into typed topology.
//!
//! ## Architecture
//!
//! - `types`: `CLUSTER NODES` / `CLUSTER INFO` records and slot spans
//! - `parsing`: INFO, Sentinel key/value and `CLUSTER SLOTS` parsers
//! - `topology`: correlation of parsed nodes and slot ranges with pods
//! - `redis_client`: `fred` clients used over a port-forward

pub mod parsing;
pub mod redis_client;
pub mod topology;
pub mod types;

pub use parsing::{ReplicationInfo, SlotEndpoint, SlotGroup, parse_cluster_slots};
pub use redis_client::{RedisConnection, SentinelConnection};
pub use topology::{ClusterTopology, CorrelatedNode, SlotCoverage, SlotOwner, SlotRange};
pub use types::{
    ClusterInfo, ClusterNode, ClusterState, NodeFlags, NodeRole, ParseError, SlotSpan,
    parse_cluster_nodes,
};
