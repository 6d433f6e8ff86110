//! Re-pointing a standalone replica at a new master.

use kuberc::resources::PodRegistry;
use kuberc::sentinel::sync_replica;
use kuberc::{ErrorKind, SentinelConfig};

use crate::common::fixtures::{INFO_MASTER, INFO_SLAVE, PodBuilder, cluster_pods};
use crate::fakes::{FakePods, FakeTunnel};

fn registry(pods: Vec<k8s_openapi::api::core::v1::Pod>) -> PodRegistry<FakePods> {
    PodRegistry::new(FakePods::new(pods), "redis")
}

#[tokio::test]
async fn test_sync_issues_replicaof() {
    let tunnel = FakeTunnel::new()
        .reply_any("info replication", INFO_MASTER)
        .reply("rc-1", "replicaof", "OK");
    let registry = registry(cluster_pods());
    let config = SentinelConfig::new("redis");

    let outcome = sync_replica(&tunnel, &registry, &config, "rc-1", "rc-0")
        .await
        .unwrap();
    assert_eq!(outcome.slave, "rc-1");
    assert_eq!(outcome.master, "rc-0");
    assert_eq!(outcome.command, "replicaof 10.0.0.1 6379");
    assert_eq!(outcome.output, "OK");

    let calls = tunnel.calls();
    assert_eq!(calls.len(), 3);
    let last = calls.last().unwrap();
    assert_eq!(last.pod, "rc-1");
    assert_eq!(last.command, "redis-cli -h 127.0.0.1 -p 6379 replicaof 10.0.0.1 6379");
}

#[tokio::test]
async fn test_sync_refuses_slave_as_master() {
    let tunnel = FakeTunnel::new()
        .reply("rc-0", "info replication", INFO_SLAVE)
        .reply("rc-1", "info replication", INFO_MASTER);
    let registry = registry(cluster_pods());
    let config = SentinelConfig::new("redis");

    let err = sync_replica(&tunnel, &registry, &config, "rc-1", "rc-0")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(err.to_string().contains("rc-0"));
    assert!(!tunnel.commands().iter().any(|c| c.contains("replicaof")));
}

#[tokio::test]
async fn test_sync_refuses_existing_slave() {
    let tunnel = FakeTunnel::new()
        .reply("rc-0", "info replication", INFO_MASTER)
        .reply("rc-1", "info replication", INFO_SLAVE);
    let registry = registry(cluster_pods());
    let config = SentinelConfig::new("redis");

    let err = sync_replica(&tunnel, &registry, &config, "rc-1", "rc-0")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(err.to_string().contains("already slave"));
    assert!(!tunnel.commands().iter().any(|c| c.contains("replicaof")));
}

#[tokio::test]
async fn test_sync_uses_redis_container_and_port() {
    let pods = vec![
        PodBuilder::new("rs-0")
            .containers(&["sentinel", "redis"])
            .ip("10.0.1.1")
            .build(),
        PodBuilder::new("rs-1")
            .containers(&["sentinel", "redis"])
            .ip("10.0.1.2")
            .build(),
    ];
    let tunnel = FakeTunnel::new().reply_any("info replication", INFO_MASTER);
    let registry = registry(pods);
    let config = SentinelConfig::new("redis")
        .with_redis_container("redis")
        .with_redis_port(7000);

    let outcome = sync_replica(&tunnel, &registry, &config, "rs-1", "rs-0")
        .await
        .unwrap();
    assert_eq!(outcome.command, "replicaof 10.0.1.1 7000");
    assert!(
        tunnel
            .calls()
            .iter()
            .all(|c| c.container.as_deref() == Some("redis") && c.command.contains("-p 7000"))
    );
}

#[tokio::test]
async fn test_sync_unknown_pod() {
    let tunnel = FakeTunnel::new();
    let registry = registry(cluster_pods());
    let config = SentinelConfig::new("redis");

    let err = sync_replica(&tunnel, &registry, &config, "rc-1", "missing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(tunnel.calls().is_empty());
}
