//! Redis Cluster administration.
//!
//! Every operation builds a `redis-cli` command line and runs it inside a
//! cluster pod through the command tunnel. Replies are parsed and
//! correlated with pods by [`crate::client`].
//!
//! ## Architecture
//!
//! - `cli`: command-line builders and option validation
//! - `admin`: [`ClusterAdmin`], one method per cluster operation

pub mod admin;
pub mod cli;

pub use admin::{ClusterAdmin, PodOutput, RedisPod, SlotReport};
pub use cli::{FailoverOptions, RebalanceOptions, RedisCli, shell_quote};
