//! Cluster sizing requests.
//!
//! Bridges `schedbench_core::ScenarioConfig` to the planner's
//! [`ClusterRequest`].

use serde::Serialize;

use schedbench_core::{JobType, ScenarioConfig};

use crate::error::{PlanError, PlanResult};

/// What a planner needs to know about one scenario's cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRequest {
    pub total_servers: u32,
    /// Total moms over all hosts. Exactly one of this and `moms_per_host`
    /// must be non-zero.
    pub total_moms: u32,
    pub moms_per_host: u32,
    pub cpus_per_mom: u32,
    pub vnodes_per_mom: u32,
    pub async_db: bool,
    pub job_type: JobType,
}

/// The dimension that drives compute-node placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomLayout {
    /// A fixed number of moms spread round-robin over hosts.
    Total(u32),
    /// The same number of moms on every host.
    PerHost(u32),
}

impl ClusterRequest {
    pub fn from_scenario(scenario: &ScenarioConfig) -> Self {
        Self {
            total_servers: scenario.total_num_svrs,
            total_moms: scenario.total_num_moms,
            moms_per_host: scenario.num_moms_per_host,
            cpus_per_mom: scenario.num_cpus_per_mom,
            vnodes_per_mom: scenario.num_vnodes_per_mom,
            async_db: scenario.async_db,
            job_type: scenario.job_type,
        }
    }

    /// Which mom dimension this request uses. Both or neither being set is
    /// an invalid configuration.
    pub fn mom_layout(&self) -> PlanResult<MomLayout> {
        match (self.total_moms, self.moms_per_host) {
            (0, 0) => Err(PlanError::InvalidConfiguration(
                "one of total_num_moms or num_moms_per_host must be set".to_string(),
            )),
            (total, 0) => Ok(MomLayout::Total(total)),
            (0, per_host) => Ok(MomLayout::PerHost(per_host)),
            (_, _) => Err(PlanError::InvalidConfiguration(
                "total_num_moms and num_moms_per_host are mutually exclusive".to_string(),
            )),
        }
    }
}
