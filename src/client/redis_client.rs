//! Wire-protocol clients used over a ready port-forward session.
//!
//! Both clients talk to `127.0.0.1:<forwarded port>`; they never reach
//! pods directly.

use std::collections::HashMap;

use fred::clients::SentinelClient;
use fred::interfaces::SentinelInterface;
use fred::prelude::*;
use fred::types::InfoKind;
use tracing::{debug, instrument};

use super::parsing::{ReplicationInfo, parse_keyed_entry, parse_keyed_pairs};
use crate::config::ClientConfig;
use crate::error::Result;

fn build_config(host: &str, port: u16, config: &ClientConfig) -> Config {
    Config {
        server: ServerConfig::Centralized {
            server: Server::new(host, port),
        },
        password: config.password.clone(),
        ..Default::default()
    }
}

/// A single-node Redis connection.
pub struct RedisConnection {
    client: Client,
}

impl RedisConnection {
    /// Connect to one Redis server.
    #[instrument(skip(config), fields(host = %host, port = %port))]
    pub async fn connect(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let command_timeout = config.command_timeout;
        let connection_timeout = config.connection_timeout;

        let client = Builder::from_config(build_config(host, port, config))
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connection_timeout;
            })
            .build()?;

        client.init().await?;
        debug!("Connected to redis");
        Ok(Self { client })
    }

    /// Ping the server.
    pub async fn ping(&self) -> Result<String> {
        let response: String = self.client.ping(None).await?;
        Ok(response)
    }

    /// Read `INFO REPLICATION`.
    #[instrument(skip(self))]
    pub async fn info_replication(&self) -> Result<ReplicationInfo> {
        let info: String = self.client.info(Some(InfoKind::Replication)).await?;
        Ok(ReplicationInfo::parse(&info))
    }

    /// Close the connection.
    pub async fn close(&self) -> Result<()> {
        self.client.quit().await?;
        Ok(())
    }
}

/// A connection to one Sentinel process.
pub struct SentinelConnection {
    client: SentinelClient,
}

impl SentinelConnection {
    /// Connect to a Sentinel.
    #[instrument(skip(config), fields(host = %host, port = %port))]
    pub async fn connect(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let command_timeout = config.command_timeout;
        let connection_timeout = config.connection_timeout;

        let client = Builder::from_config(build_config(host, port, config))
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connection_timeout;
            })
            .build_sentinel_client()?;

        client.init().await?;
        debug!("Connected to sentinel");
        Ok(Self { client })
    }

    /// `SENTINEL MASTERS`, one dictionary per monitored master.
    #[instrument(skip(self))]
    pub async fn masters(&self) -> Result<Vec<HashMap<String, String>>> {
        let reply: Value = SentinelInterface::masters(&self.client).await?;
        Ok(parse_keyed_pairs(&reply)?)
    }

    /// `SENTINEL MASTER <name>`.
    #[instrument(skip(self))]
    pub async fn master(&self, name: &str) -> Result<HashMap<String, String>> {
        let reply: Value = SentinelInterface::master(&self.client, name).await?;
        Ok(parse_keyed_entry(&reply)?)
    }

    /// `SENTINEL REPLICAS <name>`, one dictionary per replica.
    #[instrument(skip(self))]
    pub async fn replicas(&self, name: &str) -> Result<Vec<HashMap<String, String>>> {
        let reply: Value = SentinelInterface::replicas(&self.client, name).await?;
        Ok(parse_keyed_pairs(&reply)?)
    }

    /// `SENTINEL FAILOVER <name>`.
    #[instrument(skip(self))]
    pub async fn failover(&self, name: &str) -> Result<()> {
        let _: Value = SentinelInterface::failover(&self.client, name).await?;
        Ok(())
    }

    /// Close the connection.
    pub async fn close(&self) -> Result<()> {
        self.client.quit().await?;
        Ok(())
    }
}
