//! Exec and port-forward against a live redis pod.

use std::time::Duration;

use kube::Client;
use tokio_util::sync::CancellationToken;

use kuberc::client::RedisConnection;
use kuberc::cluster::ClusterAdmin;
use kuberc::resources::{
    CommandTunnel, ExecOptions, ForwardSession, KubeTunnel, PodRegistry, PortForwardError,
    SessionState,
};
use kuberc::{ClientConfig, ClusterConfig, ErrorKind};

use crate::namespace::TestNamespace;

const POD_READY_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_exec_ping() {
    let client = Client::try_default().await.unwrap();
    let ns = TestNamespace::create(client.clone(), "kuberc-exec").await;
    ns.redis_pod("redis-0", POD_READY_TIMEOUT).await;

    let admin = ClusterAdmin::new(
        KubeTunnel::new(client.clone()),
        client,
        ClusterConfig::new(ns.name()),
    );
    assert_eq!(admin.ping("redis-0").await.unwrap().trim(), "PONG");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_exec_failure_reports_exit_code() {
    let client = Client::try_default().await.unwrap();
    let ns = TestNamespace::create(client.clone(), "kuberc-exec").await;
    ns.redis_pod("redis-0", POD_READY_TIMEOUT).await;

    let registry = PodRegistry::new(client.clone(), ns.name());
    let target = registry.resolve("redis-0", None).await.unwrap();
    let tunnel = KubeTunnel::new(client);

    let err = tunnel
        .execute(&target, "echo partial; exit 3", ExecOptions::captured())
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(err.captured_output().map(str::trim), Some("partial"));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_port_forward_round_trip() {
    let client = Client::try_default().await.unwrap();
    let ns = TestNamespace::create(client.clone(), "kuberc-pf").await;
    ns.redis_pod("redis-0", POD_READY_TIMEOUT).await;

    let registry = PodRegistry::new(client.clone(), ns.name());
    let target = registry.resolve("redis-0", None).await.unwrap();

    let cancel = CancellationToken::new();
    let mut session = ForwardSession::new(client, target, 6379, 0, cancel.child_token());
    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Started);
    let port = session.local_port().unwrap();
    assert_ne!(port, 0);

    let conn = RedisConnection::connect("127.0.0.1", port, &ClientConfig::default())
        .await
        .unwrap();
    assert_eq!(conn.ping().await.unwrap(), "PONG");
    let info = conn.info_replication().await.unwrap();
    assert!(!info.is_slave());
    conn.close().await.unwrap();

    // cancelling the parent token stops the session
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), session.stopped())
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, PortForwardError::AlreadyStopped));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_port_forward_repeated_start_and_stop() {
    let client = Client::try_default().await.unwrap();
    let ns = TestNamespace::create(client.clone(), "kuberc-pf").await;
    ns.redis_pod("redis-0", POD_READY_TIMEOUT).await;

    let registry = PodRegistry::new(client.clone(), ns.name());
    let target = registry.resolve("redis-0", None).await.unwrap();

    let mut session = ForwardSession::new(client, target, 6379, 0, CancellationToken::new());
    session.start().await.unwrap();
    let port = session.local_port().unwrap();

    // a second start keeps the first relay
    session.start().await.unwrap();
    assert_eq!(session.local_port(), Some(port));
    assert_eq!(session.state(), SessionState::Started);

    let conn = RedisConnection::connect("127.0.0.1", port, &ClientConfig::default())
        .await
        .unwrap();
    assert_eq!(conn.ping().await.unwrap(), "PONG");
    conn.close().await.unwrap();

    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);

    // the listener goes away once the relay winds down
    tokio::time::timeout(Duration::from_secs(5), async {
        while tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_forward_to_missing_pod() {
    let client = Client::try_default().await.unwrap();
    let ns = TestNamespace::create(client.clone(), "kuberc-pf").await;

    let registry = PodRegistry::new(client, ns.name());
    let err = registry.resolve("redis-0", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}
