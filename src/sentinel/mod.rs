//! Redis Sentinel administration.
//!
//! Queries go to Sentinel over a port-forward; re-pointing a replica runs
//! `redis-cli` through the command tunnel.

pub mod admin;
pub mod records;
pub mod sync;

pub use admin::SentinelAdmin;
pub use records::{MasterRecord, SlaveRecord, TopologyTarget};
pub use sync::{SyncOutcome, sync_replica};
