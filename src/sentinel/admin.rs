//! Sentinel queries over a port-forward to the sentinel pod.

use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::records::{MasterRecord, SlaveRecord};
use crate::client::parsing::ReplicationInfo;
use crate::client::redis_client::{RedisConnection, SentinelConnection};
use crate::config::SentinelConfig;
use crate::error::{Error, Result};
use crate::resources::pods::{PodRegistry, Target};
use crate::resources::port_forward::ForwardSession;

const LOCALHOST: &str = "127.0.0.1";

/// A connected Sentinel session.
///
/// Holds a port-forward to the sentinel pod for its whole lifetime; the
/// forward is stopped by [`SentinelAdmin::close`] or on drop.
pub struct SentinelAdmin {
    client: Client,
    registry: PodRegistry<Client>,
    config: SentinelConfig,
    cancel: CancellationToken,
    session: ForwardSession,
    sentinel: SentinelConnection,
}

impl SentinelAdmin {
    /// Forward to `sentinel_pod` and connect to Sentinel through it.
    ///
    /// `cancel` is the process-wide interrupt token; every forward opened
    /// by this session uses a child of it.
    #[instrument(skip(client, config, cancel), fields(namespace = %config.namespace))]
    pub async fn connect(
        client: Client,
        sentinel_pod: &str,
        config: SentinelConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let registry = PodRegistry::new(client.clone(), config.namespace.clone());
        let target = registry
            .resolve(sentinel_pod, config.sentinel_container.as_deref())
            .await?;

        let mut session = ForwardSession::new(
            client.clone(),
            target,
            config.sentinel_port,
            config.local_port,
            cancel.child_token(),
        );
        session.start().await?;
        let port = local_port(&session)?;

        let sentinel = SentinelConnection::connect(LOCALHOST, port, &config.client).await?;
        Ok(Self {
            client,
            registry,
            config,
            cancel: cancel.clone(),
            session,
            sentinel,
        })
    }

    pub fn registry(&self) -> &PodRegistry<Client> {
        &self.registry
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    /// `SENTINEL MASTERS`, correlated with pods.
    pub async fn masters(&self) -> Result<Vec<MasterRecord>> {
        let entries = self.sentinel.masters().await?;
        let index = self.registry.index().await?;
        entries
            .iter()
            .map(|fields| MasterRecord::from_fields(fields, index))
            .collect()
    }

    /// One master with its replicas and their live replication status.
    #[instrument(skip(self))]
    pub async fn master(&self, name: &str) -> Result<MasterRecord> {
        let fields = self.sentinel.master(name).await?;
        let index = self.registry.index().await?;
        let mut master = MasterRecord::from_fields(&fields, index)?;

        let mut slaves = self
            .sentinel
            .replicas(name)
            .await?
            .iter()
            .map(|fields| SlaveRecord::from_fields(fields, index))
            .collect::<Result<Vec<_>>>()?;

        for slave in &mut slaves {
            slave.status = Some(self.replica_status(&slave.target.pod).await?);
        }
        master.slaves = slaves;
        Ok(master)
    }

    /// `SENTINEL FAILOVER <name>`
    pub async fn failover(&self, name: &str) -> Result<()> {
        self.sentinel.failover(name).await
    }

    /// Read `INFO REPLICATION` from a redis pod through a dedicated forward.
    ///
    /// The forward lives only for this call.
    #[instrument(skip(self), fields(pod = %pod))]
    pub async fn replica_status(&self, pod: &Target) -> Result<ReplicationInfo> {
        let mut session = ForwardSession::new(
            self.client.clone(),
            pod.clone(),
            self.config.redis_port,
            0,
            self.cancel.child_token(),
        );
        session.start().await?;
        let port = local_port(&session)?;

        let result = async {
            let conn = RedisConnection::connect(LOCALHOST, port, &self.config.client).await?;
            let info = conn.info_replication().await;
            let _ = conn.close().await;
            info
        }
        .await;

        session.stop();
        debug!(ok = result.is_ok(), "Read replica status");
        result
    }

    /// Disconnect and stop the sentinel forward.
    pub async fn close(self) -> Result<()> {
        let closed = self.sentinel.close().await;
        self.session.stop();
        closed
    }
}

fn local_port(session: &ForwardSession) -> Result<u16> {
    session
        .local_port()
        .ok_or_else(|| Error::precondition("port-forward started without a local port"))
}
