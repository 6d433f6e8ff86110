//! RAII namespace management for isolated tests.
//!
//! IMPORTANT: Tests using TestNamespace must use `#[tokio::test(flavor = "multi_thread")]`
//! to support synchronous cleanup via `block_in_place`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use k8s_openapi::api::core::v1::{Container, ContainerPort, Namespace, Pod, PodSpec};
use kube::Client;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams, PropagationPolicy};
use uuid::Uuid;

/// A test namespace that is deleted when dropped.
pub struct TestNamespace {
    client: Client,
    name: String,
    cleanup_initiated: AtomicBool,
}

impl TestNamespace {
    /// Create `{prefix}-{uuid}`.
    pub async fn create(client: Client, prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", prefix, suffix.get(..8).unwrap_or("x"));

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(
                    [(
                        "app.kubernetes.io/managed-by".to_string(),
                        "kuberc-integration-test".to_string(),
                    )]
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        Api::<Namespace>::all(client.clone())
            .create(&PostParams::default(), &ns)
            .await
            .unwrap_or_else(|e| panic!("Failed to create test namespace {}: {}", name, e));

        tracing::info!(namespace = %name, "Created test namespace");
        Self {
            client,
            name,
            cleanup_initiated: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a standalone `redis:7` pod and wait until it runs with an IP.
    pub async fn redis_pod(&self, name: &str, timeout: Duration) -> Pod {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.name);
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "redis".to_string(),
                    image: Some("redis:7".to_string()),
                    ports: Some(vec![ContainerPort {
                        container_port: 6379,
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        pods.create(&PostParams::default(), &pod)
            .await
            .unwrap_or_else(|e| panic!("Failed to create pod {}: {}", name, e));

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let pod = pods.get(name).await.unwrap();
            let status = pod.status.as_ref();
            let running = status.and_then(|s| s.phase.as_deref()) == Some("Running");
            if running && status.and_then(|s| s.pod_ip.as_ref()).is_some() {
                return pod;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Pod {} not running after {:?}", name, timeout);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        if self.cleanup_initiated.swap(true, Ordering::SeqCst) {
            return;
        }
        let name = self.name.clone();
        let client = self.client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let dp = DeleteParams {
                    propagation_policy: Some(PropagationPolicy::Background),
                    ..Default::default()
                };
                match Api::<Namespace>::all(client).delete(&name, &dp).await {
                    Ok(_) => tracing::debug!("Drop: namespace {} deletion initiated", name),
                    Err(kube::Error::Api(e)) if e.code == 404 => {}
                    Err(e) => tracing::warn!("Drop: failed to delete namespace {}: {}", name, e),
                }
            });
        });
    }
}
