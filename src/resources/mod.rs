//! Kubernetes-side plumbing.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | pods | Pod lookup by name and by IP |
//! | exec | Running commands inside a container |
//! | port_forward | Local TCP relay into a pod |

pub mod exec;
pub mod pods;
pub mod port_forward;

pub use exec::{CommandTunnel, ExecError, ExecOptions, KubeTunnel};
pub use pods::{PodIndex, PodRegistry, PodSource, Target};
pub use port_forward::{ForwardSession, PortForwardError, SessionState};
