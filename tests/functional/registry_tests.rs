//! Pod resolution and IP correlation within one registry session.

use kuberc::ErrorKind;
use kuberc::resources::PodRegistry;

use crate::common::fixtures::{PodBuilder, cluster_pods};
use crate::fakes::FakePods;

#[tokio::test]
async fn test_concurrent_index_lists_once() {
    let pods = FakePods::new(cluster_pods());
    let registry = PodRegistry::new(pods.clone(), "redis");

    let (a, b) = tokio::join!(registry.index(), registry.index());
    assert_eq!(a.unwrap().len(), 6);
    assert_eq!(b.unwrap().len(), 6);
    assert_eq!(pods.list_count(), 1);

    let target = registry.lookup_by_ip("10.0.0.4").await.unwrap();
    assert_eq!(target.name, "rc-3");
    assert_eq!(pods.list_count(), 1);
}

#[tokio::test]
async fn test_index_is_a_snapshot() {
    let pods = FakePods::new(cluster_pods());
    let registry = PodRegistry::new(pods.clone(), "redis");
    registry.index().await.unwrap();

    // a fresh session sees the same source again
    let second = PodRegistry::new(pods.clone(), "redis");
    second.index().await.unwrap();
    assert_eq!(pods.list_count(), 2);
}

#[tokio::test]
async fn test_resolution_is_namespace_scoped() {
    let pods = FakePods::new(vec![
        PodBuilder::new("rc-0").ip("10.0.0.1").build(),
        PodBuilder::new("other-0")
            .namespace("other")
            .ip("10.0.0.2")
            .build(),
    ]);
    let registry = PodRegistry::new(pods, "redis");
    assert_eq!(registry.namespace(), "redis");

    assert!(registry.resolve("rc-0", None).await.is_ok());
    let err = registry.resolve("other-0", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);

    let err = registry.lookup_by_ip("10.0.0.2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Correlation);
}

#[tokio::test]
async fn test_resolve_pins_container() {
    let pods = FakePods::new(vec![
        PodBuilder::new("rs-0")
            .containers(&["sentinel", "redis"])
            .ip("10.0.1.1")
            .build(),
    ]);
    let registry = PodRegistry::new(pods, "redis");

    let default = registry.resolve("rs-0", None).await.unwrap();
    assert_eq!(default.container.as_deref(), Some("sentinel"));

    let pinned = registry.resolve("rs-0", Some("redis")).await.unwrap();
    assert_eq!(pinned.container.as_deref(), Some("redis"));

    let err = registry.resolve("rs-0", Some("exporter")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
}
