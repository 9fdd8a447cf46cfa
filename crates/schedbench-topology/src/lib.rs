//! schedbench topology planner: how a benchmark cluster is laid out.
//!
//! Given a scenario's sizing and the ordered host list, this crate decides
//! where every server and compute-node ("mom") runs, which ports each one
//! listens on, and which server each mom reports to. It does NOT run
//! anything (that's `schedbench-rollout`); it produces a frozen plan and the
//! address strings the provisioning commands need.
//!
//! # Components
//!
//! - **`request`**: Cluster sizing derived from a scenario config
//! - **`planner`**: Host distribution, port allocation, mom binding
//! - **`encode`**: Server endpoint lists and the topology descriptor

pub mod encode;
pub mod error;
pub mod planner;
pub mod request;

pub use encode::{ClusterAddressing, HostTopology, MomAddr, ServerGroup, TopologyDescriptor, encode};
pub use error::{PlanError, PlanResult, TopologyParseError};
pub use planner::{BASE_PORT, ClusterPlan, HostPlan, MomSpec, NodeSpec, PortPair, ServerRef, ServerSpec, plan};
pub use request::{ClusterRequest, MomLayout};
