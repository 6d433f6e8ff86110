//! Re-pointing a standalone Redis at a new master.

use serde::Serialize;
use tracing::{info, instrument};

use crate::client::parsing::ReplicationInfo;
use crate::cluster::RedisCli;
use crate::config::SentinelConfig;
use crate::error::{Error, Result};
use crate::resources::exec::{CommandTunnel, ExecOptions};
use crate::resources::pods::{PodRegistry, PodSource, Target};

/// Result of a [`sync_replica`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub slave: String,
    pub master: String,
    pub command: String,
    pub output: String,
}

/// Make `slave_pod` a replica of `master_pod` with `REPLICAOF`.
///
/// Refused when the intended master reports itself a slave, or when the
/// intended slave already is one.
#[instrument(skip(tunnel, registry, config))]
pub async fn sync_replica<T, S>(
    tunnel: &T,
    registry: &PodRegistry<S>,
    config: &SentinelConfig,
    slave_pod: &str,
    master_pod: &str,
) -> Result<SyncOutcome>
where
    T: CommandTunnel,
    S: PodSource,
{
    let container = config.redis_container.as_deref();
    let master = registry.resolve(master_pod, container).await?;
    let slave = registry.resolve(slave_pod, container).await?;
    let cli = RedisCli::new(&config.cli, config.redis_port);

    if replication(tunnel, &cli, &master).await?.is_slave() {
        return Err(Error::precondition(format!(
            "target master pod {}'s role is slave",
            master_pod
        )));
    }
    if replication(tunnel, &cli, &slave).await?.is_slave() {
        return Err(Error::precondition(format!(
            "target slave pod {}'s role is already slave",
            slave_pod
        )));
    }

    let command = format!("replicaof {} {}", master.ip()?, config.redis_port);
    info!(slave = %slave, master = %master, "Re-pointing replica");
    let output = tunnel
        .execute(&slave, &cli.standalone(&command), ExecOptions::captured())
        .await?;

    Ok(SyncOutcome {
        slave: slave.name,
        master: master.name,
        command,
        output,
    })
}

async fn replication<T: CommandTunnel>(
    tunnel: &T,
    cli: &RedisCli<'_>,
    target: &Target,
) -> Result<ReplicationInfo> {
    let output = tunnel
        .execute(
            target,
            &cli.standalone("info replication"),
            ExecOptions::captured(),
        )
        .await?;
    Ok(ReplicationInfo::parse(&output))
}
