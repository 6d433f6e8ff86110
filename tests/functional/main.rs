// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for cluster and sentinel operations.
//!
//! These tests drive the real operation code against a scripted command
//! tunnel and an in-memory pod source. No Kubernetes cluster or redis
//! server is required.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_rebalance_rejects_short_timeout
//! ```
//!
//! ## Test Categories
//!
//! - **Cluster tests**: topology, slots, failover, rebalance, add/del node
//! - **Sync tests**: re-pointing a standalone replica
//! - **Registry tests**: pod resolution and the once-per-session IP index

#[path = "../common/mod.rs"]
mod common;


mod registry_tests;
mod sync_tests;
