//! Rendering of command results as plain tables or JSON.

use serde::Serialize;

use kuberc::Result;
use kuberc::client::{ClusterInfo, ClusterTopology, ReplicationInfo};
use kuberc::cluster::{PodOutput, SlotReport};
use kuberc::sentinel::{MasterRecord, SyncOutcome, TopologyTarget};

use crate::OutputFormat;

pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Raw command output.
    pub fn text(&self, output: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.json(output),
            OutputFormat::Table => {
                println!("{}", output.trim_end());
                Ok(())
            }
        }
    }

    pub fn per_pod(&self, outputs: &[PodOutput]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(outputs);
        }
        for o in outputs {
            println!("{}:", o.pod);
            for line in o.output.trim_end().lines() {
                println!("  {}", line);
            }
        }
        Ok(())
    }

    pub fn cluster_info(&self, info: &ClusterInfo) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(info);
        }
        println!("state           {}", info.state);
        println!("slots assigned  {}", info.slots_assigned);
        println!("slots ok        {}", info.slots_ok);
        println!("slots pfail     {}", info.slots_pfail);
        println!("slots fail      {}", info.slots_fail);
        println!("known nodes     {}", info.known_nodes);
        println!("size            {}", info.cluster_size);
        println!("current epoch   {}", info.current_epoch);
        Ok(())
    }

    /// Masters with their replicas indented below.
    pub fn topology(&self, topology: &ClusterTopology) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(topology);
        }
        println!(
            "{:<24} {:<40} {:<21} {:<8} SLOTS",
            "POD", "NODE ID", "ADDRESS", "ROLE"
        );
        for group in topology.groups() {
            let master = &group.master.node;
            let slots = master
                .slots
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            println!(
                "{:<24} {:<40} {:<21} {:<8} {}",
                group.master.pod.name,
                master.node_id,
                format!("{}:{}", master.ip, master.port),
                "master",
                slots
            );
            for replica in group.replicas {
                println!(
                    "  {:<22} {:<40} {:<21} {:<8}",
                    replica.pod.name,
                    replica.node.node_id,
                    format!("{}:{}", replica.node.ip, replica.node.port),
                    "slave"
                );
            }
        }
        println!(
            "{} nodes, {} slots assigned",
            topology.len(),
            topology.assigned_slots()
        );
        Ok(())
    }

    pub fn slots(&self, report: &SlotReport) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(report);
        }
        println!("{:<13} {:>6}  {:<24} REPLICAS", "SLOTS", "COUNT", "MASTER");
        for range in &report.ranges {
            let replicas = range
                .replicas
                .iter()
                .map(|r| r.pod.name.as_str())
                .collect::<Vec<_>>()
                .join(",");
            println!(
                "{:<13} {:>6}  {:<24} {}",
                range.span().to_string(),
                range.count(),
                range.master.pod.name,
                replicas
            );
        }
        if !report.coverage.is_complete() {
            for gap in &report.coverage.gaps {
                println!("unassigned {}", gap);
            }
            for (a, b) in &report.coverage.overlaps {
                println!("overlap {} / {}", a, b);
            }
        }
        Ok(())
    }

    pub fn masters(&self, masters: &[MasterRecord]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(masters);
        }
        println!("{:<16} {:<24} {:<21} {:>6}  FLAGS", "NAME", "POD", "ADDRESS", "SLAVES");
        for m in masters {
            println!(
                "{:<16} {:<24} {:<21} {:>6}  {}",
                m.target.name,
                m.target.pod.name,
                address(&m.target),
                m.num_slaves,
                m.target.flags.join(",")
            );
        }
        Ok(())
    }

    /// A master and the live replication state of each slave.
    pub fn master(&self, master: &MasterRecord) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(master);
        }
        self.masters(std::slice::from_ref(master))?;
        println!();
        println!(
            "{:<24} {:<21} {:<6} {:>9} {:<7}  FLAGS",
            "SLAVE POD", "ADDRESS", "LINK", "IOSECAGO", "SYNCING"
        );
        for slave in &master.slaves {
            let [link, io_ago, syncing] = status_columns(slave.status.as_ref());
            println!(
                "{:<24} {:<21} {:<6} {:>9} {:<7}  {}",
                slave.target.pod.name,
                address(&slave.target),
                link,
                io_ago,
                syncing,
                slave.target.flags.join(",")
            );
        }
        Ok(())
    }

    pub fn sync(&self, outcome: &SyncOutcome) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(outcome);
        }
        println!(
            "{} -> {}: {}",
            outcome.slave,
            outcome.master,
            outcome.output.trim_end()
        );
        Ok(())
    }
}

fn address(target: &TopologyTarget) -> String {
    match target.port {
        Some(port) => format!("{}:{}", target.ip, port),
        None => target.ip.clone(),
    }
}

/// Link status, seconds since the last master I/O, and whether a full
/// sync is running. `?` when the replica could not be queried.
fn status_columns(status: Option<&ReplicationInfo>) -> [String; 3] {
    let Some(status) = status else {
        return ["?".to_string(), "?".to_string(), "?".to_string()];
    };
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    [
        or_dash(status.master_link_status.clone()),
        or_dash(status.master_last_io_seconds_ago.map(|s| s.to_string())),
        or_dash(
            status
                .master_sync_in_progress
                .map(|syncing| if syncing { "yes" } else { "no" }.to_string()),
        ),
    ]
}
