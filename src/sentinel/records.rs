//! Sentinel master and replica records.
//!
//! Both record kinds share a [`TopologyTarget`] holding what Sentinel
//! reports about an instance plus the pod it runs in.

use std::collections::HashMap;

use serde::Serialize;

use crate::client::parsing::ReplicationInfo;
use crate::client::types::ParseError;
use crate::error::Result;
use crate::resources::pods::{PodIndex, Target};

/// An instance as reported by Sentinel, correlated with its pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyTarget {
    /// Logical name: the master name, or `ip:port` for replicas.
    pub name: String,
    pub ip: String,
    pub port: Option<u16>,
    pub flags: Vec<String>,
    pub role_reported: Option<String>,
    pub pod: Target,
}

impl TopologyTarget {
    /// Build from one Sentinel key/value dictionary.
    ///
    /// `name` and `ip` are required; an IP without a pod in the namespace
    /// is a correlation error.
    pub fn from_fields(fields: &HashMap<String, String>, index: &PodIndex) -> Result<Self> {
        let name = required(fields, "name")?;
        let ip = required(fields, "ip")?;
        let pod = index.lookup(&ip)?.clone();

        Ok(TopologyTarget {
            name,
            ip,
            port: fields.get("port").and_then(|p| p.parse().ok()),
            flags: fields
                .get("flags")
                .map(|f| {
                    f.split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            role_reported: fields.get("role-reported").cloned(),
            pod,
        })
    }

    /// Check for a flag such as `s_down` or `o_down`.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

fn required(fields: &HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ParseError::MissingField(key.to_string()).into())
}

/// A master monitored by Sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterRecord {
    pub target: TopologyTarget,
    pub num_slaves: u32,
    /// Replicas, attached only when asked for.
    pub slaves: Vec<SlaveRecord>,
}

impl MasterRecord {
    pub fn from_fields(fields: &HashMap<String, String>, index: &PodIndex) -> Result<Self> {
        let target = TopologyTarget::from_fields(fields, index)?;
        let raw = fields
            .get("num-slaves")
            .ok_or_else(|| ParseError::MissingField("num-slaves".to_string()))?;
        let num_slaves = raw.parse().map_err(|_| {
            ParseError::InvalidSentinelReply(format!("num-slaves is not a number: {:?}", raw))
        })?;

        Ok(MasterRecord {
            target,
            num_slaves,
            slaves: Vec::new(),
        })
    }
}

/// A replica of a Sentinel-monitored master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaveRecord {
    pub target: TopologyTarget,
    /// Live replication status, once queried.
    pub status: Option<ReplicationInfo>,
}

impl SlaveRecord {
    pub fn from_fields(fields: &HashMap<String, String>, index: &PodIndex) -> Result<Self> {
        Ok(SlaveRecord {
            target: TopologyTarget::from_fields(fields, index)?,
            status: None,
        })
    }
}
