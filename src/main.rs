//! kuberc - operate Redis Cluster and Redis Sentinel on Kubernetes.
//!
//! This is the command-line entry point that:
//! - Initializes structured logging on stderr
//! - Builds the Kubernetes client from kubeconfig
//! - Installs the process-wide interrupt listener
//! - Dispatches `cluster` and `sentinel` subcommands

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use kube::Client;
use tracing::debug;

use kuberc::cluster::{ClusterAdmin, FailoverOptions, RebalanceOptions};
use kuberc::resources::{KubeTunnel, PodRegistry};
use kuberc::sentinel::{SentinelAdmin, sync_replica};
use kuberc::signals::install_interrupt_handler;
use kuberc::{ClientConfig, ClusterConfig, KubeConfigSource, SentinelConfig};

use output::Printer;

/// Inspect and operate Redis Cluster and Redis Sentinel on Kubernetes.
#[derive(Parser)]
#[command(name = "kuberc", version, about)]
struct Cli {
    /// Namespace of the redis pods. Defaults to the kubeconfig namespace.
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Kubeconfig file. Defaults to $KUBECONFIG or ~/.kube/config.
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context.
    #[arg(long, global = true)]
    context: Option<String>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Manage a Redis Cluster.
    Cluster(ClusterArgs),
    /// Manage Redis Sentinel.
    Sentinel(SentinelArgs),
}

#[derive(Args)]
struct ClusterArgs {
    /// Redis port inside the pods.
    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Redis container name. Defaults to the first container.
    #[arg(short, long)]
    container: Option<String>,

    /// Command-line tool inside the container.
    #[arg(long, default_value = "redis-cli")]
    cli: String,

    #[command(subcommand)]
    op: ClusterOp,
}

#[derive(Subcommand)]
enum ClusterOp {
    /// Ping a redis node.
    Ping { pod: String },

    /// Run a command on a redis node.
    Call {
        pod: String,
        /// Run on every node of the cluster.
        #[arg(long)]
        all: bool,
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Get a config value.
    ConfigGet {
        pod: String,
        key: String,
        /// Read from every node of the cluster.
        #[arg(long)]
        all: bool,
    },

    /// Set a config value.
    ConfigSet {
        pod: String,
        key: String,
        value: String,
        /// Apply on every node of the cluster.
        #[arg(long)]
        all: bool,
    },

    /// Show CLUSTER INFO.
    Info { pod: String },

    /// Show the node id of a pod.
    Myid { pod: String },

    /// Show the role of a pod.
    Role { pod: String },

    /// Create a cluster from pods.
    Create {
        #[arg(required = true, num_args = 2..)]
        pods: Vec<String>,
        /// Replicas per master.
        #[arg(long, default_value_t = 0)]
        replicas: u32,
        /// Don't ask for confirmation.
        #[arg(long)]
        yes: bool,
    },

    /// Add <new> to the cluster <existing> belongs to.
    AddNode {
        new: String,
        existing: String,
        /// Make <new> a slave of <existing>.
        #[arg(long)]
        slave: bool,
    },

    /// Remove a node from the cluster.
    DelNode {
        pod: String,
        /// Pod used to reach the cluster. Defaults to the removed pod.
        #[arg(long)]
        entry_pod: Option<String>,
    },

    /// Manual failover on a slave.
    Failover {
        pod: String,
        /// Failover without handshake with the master.
        #[arg(long)]
        force: bool,
        /// Failover without cluster consensus.
        #[arg(long)]
        takeover: bool,
    },

    /// Rebalance slots between masters.
    Rebalance {
        pod: String,
        /// Weights per pod, e.g. rc-0=1,rc-1=2.
        #[arg(long, default_value = "")]
        weight: String,
        /// Assign slots to empty masters.
        #[arg(long)]
        use_empty_masters: bool,
        /// Migration timeout per batch in milliseconds.
        #[arg(long, default_value_t = 60000, allow_negative_numbers = true)]
        timeout: i64,
        /// Dry run.
        #[arg(long)]
        simulate: bool,
        /// Keys migrated per batch.
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        pipeline: i64,
        /// Rebalance only above this slot imbalance percentage.
        #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
        threshold: i64,
        /// Replace existing keys on the target node.
        #[arg(long)]
        replace: bool,
    },

    /// Run redis-cli --cluster check.
    Check { pod: String },

    /// List nodes grouped by master.
    Nodes { pod: String },

    /// List slot ranges and their owners.
    Slots { pod: String },
}

#[derive(Args)]
struct SentinelArgs {
    /// Sentinel port inside the sentinel pod.
    #[arg(short, long, default_value_t = 26379)]
    port: u16,

    /// Redis port inside the redis pods.
    #[arg(long, default_value_t = 6379)]
    redis_port: u16,

    /// Sentinel container name. Defaults to the first container.
    #[arg(short, long)]
    container: Option<String>,

    /// Redis container name. Defaults to the first container.
    #[arg(long)]
    redis_container: Option<String>,

    /// Local port for the sentinel forward. 0 picks a free port.
    #[arg(long, default_value_t = 0)]
    local_port: u16,

    /// Command-line tool inside the redis containers.
    #[arg(long, default_value = "redis-cli")]
    cli: String,

    /// Password for redis and sentinel.
    #[arg(long, env = "REDISCLI_AUTH", hide_env_values = true)]
    password: Option<String>,

    /// Seconds to wait for a redis or sentinel connection.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Seconds to wait for a redis or sentinel reply.
    #[arg(long, default_value_t = 30)]
    command_timeout: u64,

    #[command(subcommand)]
    op: SentinelOp,
}

impl SentinelArgs {
    fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default()
            .with_connection_timeout(Duration::from_secs(self.connect_timeout))
            .with_command_timeout(Duration::from_secs(self.command_timeout));
        match &self.password {
            Some(password) => config.with_password(password.clone()),
            None => config,
        }
    }
}

#[derive(Subcommand)]
enum SentinelOp {
    /// List monitored masters.
    Masters { sentinel_pod: String },

    /// Show a master with its slaves and their sync status.
    Master { sentinel_pod: String, name: String },

    /// Trigger a sentinel failover.
    Failover { sentinel_pod: String, name: String },

    /// Make <slave-pod> a slave of <master-pod>.
    Sync { slave_pod: String, master_pod: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose, cli.log_json) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(captured) = e.captured_output() {
                eprintln!("{}", captured);
            }
            debug!(kind = ?e.kind(), "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (own, kube) = match verbose {
        0 => ("warn", "warn"),
        1 => ("info", "warn"),
        2 => ("debug", "info"),
        _ => ("trace", "debug"),
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("kuberc={}", own).parse()?)
        .add_directive(format!("kube={}", kube).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(cli: Cli) -> kuberc::Result<()> {
    let source = KubeConfigSource {
        kubeconfig: cli.kubeconfig,
        context: cli.context,
    };
    let client = source.client().await?;
    let namespace = cli
        .namespace
        .unwrap_or_else(|| client.default_namespace().to_string());
    debug!(namespace = %namespace, "Connected to Kubernetes");

    let printer = Printer::new(cli.output);
    match cli.command {
        Command::Cluster(args) => run_cluster(client, namespace, args, &printer).await,
        Command::Sentinel(args) => run_sentinel(client, namespace, args, &printer).await,
    }
}

async fn run_cluster(
    client: Client,
    namespace: String,
    args: ClusterArgs,
    printer: &Printer,
) -> kuberc::Result<()> {
    let mut config = ClusterConfig::new(namespace)
        .with_redis_port(args.port)
        .with_cli(args.cli);
    if let Some(container) = args.container {
        config = config.with_container(container);
    }
    let admin = ClusterAdmin::new(KubeTunnel::new(client.clone()), client, config);

    match args.op {
        ClusterOp::Ping { pod } => printer.text(&admin.ping(&pod).await?),
        ClusterOp::Call { pod, all, args } => {
            if all {
                printer.per_pod(&admin.call_all(&pod, &args).await?)
            } else {
                printer.text(&admin.call(&pod, &args).await?)
            }
        }
        ClusterOp::ConfigGet { pod, key, all } => {
            if all {
                printer.per_pod(&admin.config_get_all(&pod, &key).await?)
            } else {
                printer.text(&admin.config_get(&pod, &key).await?)
            }
        }
        ClusterOp::ConfigSet {
            pod,
            key,
            value,
            all,
        } => {
            if all {
                printer.per_pod(&admin.config_set_all(&pod, &key, &value).await?)
            } else {
                printer.text(&admin.config_set(&pod, &key, &value).await?)
            }
        }
        ClusterOp::Info { pod } => printer.cluster_info(&admin.cluster_info(&pod).await?),
        ClusterOp::Myid { pod } => {
            let pod = admin.pod(&pod).await?;
            printer.text(&admin.node_id(&pod).await?)
        }
        ClusterOp::Role { pod } => {
            let pod = admin.pod(&pod).await?;
            printer.text(&admin.role(&pod).await?.to_string())
        }
        ClusterOp::Create {
            pods,
            replicas,
            yes,
        } => admin.create(&pods, replicas, yes).await,
        ClusterOp::AddNode {
            new,
            existing,
            slave,
        } => printer.text(&admin.add_node(&new, &existing, slave).await?),
        ClusterOp::DelNode { pod, entry_pod } => {
            printer.text(&admin.del_node(&pod, entry_pod.as_deref()).await?)
        }
        ClusterOp::Failover {
            pod,
            force,
            takeover,
        } => {
            let options = FailoverOptions { force, takeover };
            printer.text(&admin.failover(&pod, options).await?)
        }
        ClusterOp::Rebalance {
            pod,
            weight,
            use_empty_masters,
            timeout,
            simulate,
            pipeline,
            threshold,
            replace,
        } => {
            let options = RebalanceOptions {
                weights: RebalanceOptions::parse_weights(&weight)?,
                use_empty_masters,
                timeout_ms: timeout,
                simulate,
                pipeline,
                threshold,
                replace,
            };
            admin.rebalance(&pod, &options).await
        }
        ClusterOp::Check { pod } => printer.text(&admin.check(&pod).await?),
        ClusterOp::Nodes { pod } => printer.topology(&admin.nodes(&pod).await?),
        ClusterOp::Slots { pod } => printer.slots(&admin.slots(&pod).await?),
    }
}

async fn run_sentinel(
    client: Client,
    namespace: String,
    args: SentinelArgs,
    printer: &Printer,
) -> kuberc::Result<()> {
    let client_config = args.client_config();
    let mut config = SentinelConfig::new(namespace)
        .with_sentinel_port(args.port)
        .with_redis_port(args.redis_port)
        .with_local_port(args.local_port)
        .with_cli(args.cli)
        .with_client(client_config);
    if let Some(container) = args.container {
        config = config.with_sentinel_container(container);
    }
    if let Some(container) = args.redis_container {
        config = config.with_redis_container(container);
    }

    let sentinel_pod = match &args.op {
        SentinelOp::Sync {
            slave_pod,
            master_pod,
        } => {
            let registry = PodRegistry::new(client.clone(), config.namespace.clone());
            let tunnel = KubeTunnel::new(client);
            let outcome = sync_replica(&tunnel, &registry, &config, slave_pod, master_pod).await?;
            return printer.sync(&outcome);
        }
        SentinelOp::Masters { sentinel_pod }
        | SentinelOp::Master { sentinel_pod, .. }
        | SentinelOp::Failover { sentinel_pod, .. } => sentinel_pod.clone(),
    };

    let interrupt = install_interrupt_handler();
    let admin = SentinelAdmin::connect(client, &sentinel_pod, config, &interrupt).await?;
    let result = query_sentinel(&admin, &args.op, printer).await;
    let closed = admin.close().await;
    result.and(closed)
}

async fn query_sentinel(
    admin: &SentinelAdmin,
    op: &SentinelOp,
    printer: &Printer,
) -> kuberc::Result<()> {
    match op {
        SentinelOp::Masters { .. } => printer.masters(&admin.masters().await?),
        SentinelOp::Master { name, .. } => printer.master(&admin.master(name).await?),
        SentinelOp::Failover { name, .. } => {
            admin.failover(name).await?;
            printer.text("OK")
        }
        SentinelOp::Sync { .. } => Ok(()),
    }
}
