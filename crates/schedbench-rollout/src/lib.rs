//! schedbench rollout: bringing a planned cluster up and tearing it down.
//!
//! This crate turns a frozen `schedbench_topology::ClusterPlan` into
//! container commands and runs them on the target hosts, concurrently and
//! with an all-or-nothing verdict. Every side effect goes through the
//! [`RemoteExecutor`] seam so tests can substitute a recording executor.
//!
//! # Components
//!
//! - **`executor`**: Run a command on a host (directly or over ssh)
//! - **`settings`**: Image, label, paths, and parallelism knobs
//! - **`command`**: argv builders for every container operation
//! - **`engine`**: Parallel provisioning and verdict aggregation
//! - **`cleanup`**: Pre-flight container cleanup and system cleanup
//! - **`staging`**: Copying and loading the image archive on every host

pub mod cleanup;
pub mod command;
pub mod engine;
pub mod executor;
pub mod settings;
pub mod staging;

pub use cleanup::{cleanup_host, cleanup_hosts, cleanup_system};
pub use engine::{NodeOutcome, RolloutEngine, RolloutReport};
pub use executor::{ExecFuture, RemoteExecutor, SshExecutor};
pub use settings::HarnessSettings;
pub use staging::stage_artifacts;
