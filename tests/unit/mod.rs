// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for kuberc.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation.

#[path = "../common/mod.rs"]
mod common;

mod target_tests {
    use crate::common::fixtures::PodBuilder;
    use kuberc::resources::{PodIndex, Target};
    use kuberc::{Error, ErrorKind};

    #[test]
    fn test_default_container_is_first() {
        let pod = PodBuilder::new("rc-0")
            .containers(&["redis", "exporter"])
            .ip("10.0.0.1")
            .node_name("node-a")
            .build();
        let target = Target::from_pod(&pod, None).unwrap();
        assert_eq!(target.container.as_deref(), Some("redis"));
        assert_eq!(target.node_name.as_deref(), Some("node-a"));
        assert_eq!(target.to_string(), "redis/rc-0");
        assert!(target.running);
    }

    #[test]
    fn test_explicit_container() {
        let pod = PodBuilder::new("rc-0")
            .containers(&["redis", "exporter"])
            .build();
        let target = Target::from_pod(&pod, Some("exporter")).unwrap();
        assert_eq!(target.container.as_deref(), Some("exporter"));
    }

    #[test]
    fn test_unknown_container() {
        let pod = PodBuilder::new("rc-0").build();
        let err = Target::from_pod(&pod, Some("sidecar")).unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound { ref container, .. } if container == "sidecar"));
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn test_pending_pod_without_ip() {
        let target = PodBuilder::new("rc-0").phase("Pending").target();
        assert!(!target.running);
        assert_eq!(target.ensure_running().unwrap_err().kind(), ErrorKind::Precondition);
        assert_eq!(target.ip().unwrap_err().kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_index_first_pod_wins_and_skips_unassigned() {
        let pods = vec![
            PodBuilder::new("a").ip("10.0.0.1").build(),
            PodBuilder::new("b").ip("10.0.0.1").build(),
            PodBuilder::new("c").build(),
        ];
        let index = PodIndex::from_pods("redis", &pods);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("10.0.0.1").unwrap().name, "a");

        let err = index.lookup("10.0.0.9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Correlation);
        assert!(err.to_string().contains("10.0.0.9"));
    }
}

mod error_tests {
    use kuberc::client::ParseError;
    use kuberc::resources::{ExecError, PortForwardError};
    use kuberc::{Error, ErrorKind};

    #[test]
    fn test_classification() {
        assert_eq!(
            Error::PodNotFound {
                namespace: "redis".to_string(),
                name: "rc-0".to_string()
            }
            .kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            Error::NotInCluster("rc-9".to_string()).kind(),
            ErrorKind::Resolution
        );
        assert_eq!(
            Error::from(ParseError::InvalidClusterInfo("x".to_string())).kind(),
            ErrorKind::Format
        );
        assert_eq!(
            Error::from(PortForwardError::LocalPortInUse(6379)).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            Error::from(PortForwardError::StreamUnavailable(6379)).kind(),
            ErrorKind::Tunnel
        );
    }

    #[test]
    fn test_failed_exec_keeps_output_and_exit_code() {
        let exec = ExecError::Failed {
            pod: "redis/rc-0".to_string(),
            message: "command terminated with non-zero exit code".to_string(),
            exit_code: Some(1),
            captured: "[ERR] Not all 16384 slots are covered".to_string(),
        };
        assert_eq!(exec.exit_code(), Some(1));

        let err = Error::from(exec);
        assert_eq!(err.kind(), ErrorKind::Tunnel);
        assert_eq!(
            err.captured_output(),
            Some("[ERR] Not all 16384 slots are covered")
        );
    }

    #[test]
    fn test_empty_capture_is_none() {
        let err = Error::from(ExecError::Stream {
            pod: "redis/rc-0".to_string(),
            message: "stream closed".to_string(),
            captured: String::new(),
        });
        assert_eq!(err.captured_output(), None);
    }
}

mod config_tests {
    use kuberc::config::{DEFAULT_CLI, DEFAULT_REDIS_PORT, DEFAULT_SENTINEL_PORT};
    use kuberc::{ClusterConfig, SentinelConfig};

    #[test]
    fn test_cluster_defaults() {
        let config = ClusterConfig::new("redis");
        assert_eq!(config.namespace, "redis");
        assert_eq!(config.redis_port, DEFAULT_REDIS_PORT);
        assert_eq!(config.cli, DEFAULT_CLI);
        assert!(config.container.is_none());
    }

    #[test]
    fn test_sentinel_to_cluster_config() {
        let config = SentinelConfig::new("redis")
            .with_redis_port(7000)
            .with_redis_container("redis")
            .with_sentinel_container("sentinel")
            .with_cli("valkey-cli");
        assert_eq!(config.sentinel_port, DEFAULT_SENTINEL_PORT);
        assert_eq!(config.local_port, 0);

        let cluster = config.redis_cluster_config();
        assert_eq!(cluster.redis_port, 7000);
        assert_eq!(cluster.container.as_deref(), Some("redis"));
        assert_eq!(cluster.cli, "valkey-cli");
    }
}

mod cli_tests {
    use kuberc::ErrorKind;
    use kuberc::cluster::{FailoverOptions, RebalanceOptions, RedisCli};

    #[test]
    fn test_custom_binary_and_port() {
        let cli = RedisCli::new("valkey-cli", 7000);
        assert_eq!(cli.standalone("ping"), "valkey-cli -h 127.0.0.1 -p 7000 ping");
        assert_eq!(cli.local("ping"), "valkey-cli -c -h 127.0.0.1 -p 7000 ping");
    }

    #[test]
    fn test_takeover_command() {
        let opts = FailoverOptions {
            force: false,
            takeover: true,
        };
        assert!(opts.validate().is_ok());
        assert_eq!(opts.command(), "cluster failover takeover");
    }

    #[test]
    fn test_rebalance_defaults_are_valid() {
        let opts = RebalanceOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(
            opts.subcommand("10.0.0.1:6379", &[]),
            "rebalance 10.0.0.1:6379 --cluster-timeout 60000 --cluster-pipeline 10 --cluster-threshold 2"
        );
    }

    #[test]
    fn test_rebalance_negative_timeout() {
        let opts = RebalanceOptions {
            timeout_ms: -1,
            ..Default::default()
        };
        assert_eq!(opts.validate().unwrap_err().kind(), ErrorKind::Precondition);
    }
}

mod parser_tests {
    use kuberc::client::{ClusterInfo, ClusterState, ReplicationInfo, parse_cluster_nodes};

    use crate::common::fixtures::{CLUSTER_NODES, INFO_SLAVE};

    #[test]
    fn test_cluster_nodes_fixture() {
        let nodes = parse_cluster_nodes(CLUSTER_NODES).unwrap();
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes.iter().filter(|n| n.is_master()).count(), 3);
        assert_eq!(
            nodes.iter().map(|n| n.slot_count()).sum::<u32>(),
            16384
        );
    }

    #[test]
    fn test_cluster_info() {
        let info = ClusterInfo::parse(
            "cluster_state:ok\r\ncluster_slots_assigned:16384\r\ncluster_slots_ok:16384\r\ncluster_slots_pfail:0\r\ncluster_slots_fail:0\r\ncluster_known_nodes:6\r\ncluster_size:3\r\ncluster_current_epoch:6\r\ncluster_my_epoch:1\r\n",
        )
        .unwrap();
        assert_eq!(info.state, ClusterState::Ok);
        assert_eq!(info.known_nodes, 6);
        assert_eq!(info.cluster_size, 3);
    }

    #[test]
    fn test_replica_link_state() {
        let info = ReplicationInfo::parse(INFO_SLAVE);
        assert!(info.is_slave());
        assert_eq!(info.master_link_status.as_deref(), Some("up"));
        assert_eq!(info.master_last_io_seconds_ago, Some(4));
        assert_eq!(info.master_sync_in_progress, Some(false));
    }
}
