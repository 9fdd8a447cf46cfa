//! Scenario matrix generation.
//!
//! Expands lists of cluster sizes into a [`BenchConfig`], keeping only the
//! combinations that provide a fixed total CPU count so results stay
//! comparable across layouts.

use crate::config::{BenchConfig, ScenarioConfig};
use crate::types::JobType;

/// Inputs for [`generate`].
#[derive(Debug, Clone)]
pub struct MatrixSpec {
    pub mom_counts: Vec<u32>,
    pub cpu_counts: Vec<u32>,
    pub async_db: Vec<bool>,
    pub job_types: Vec<JobType>,
    pub vnodes_per_mom: u32,
    /// Only combinations where `moms * cpus` equals this are kept.
    pub total_cpus: u64,
}

impl Default for MatrixSpec {
    fn default() -> Self {
        Self {
            mom_counts: vec![100, 25],
            cpu_counts: vec![200, 100, 50],
            async_db: vec![false, true],
            job_types: vec![JobType::Job, JobType::JobArray],
            vnodes_per_mom: 0,
            total_cpus: 5000,
        }
    }
}

/// Name of a generated scenario, e.g. `100m50cpu_sync_j`.
pub fn scenario_name(moms: u32, cpus: u32, async_db: bool, job_type: JobType) -> String {
    let db = if async_db { "async" } else { "sync" };
    format!("{moms}m{cpus}cpu_{db}_{job_type}")
}

/// Build every scenario described by `spec`.
pub fn generate(spec: &MatrixSpec) -> BenchConfig {
    let mut config = BenchConfig::default();
    for &moms in &spec.mom_counts {
        for &cpus in &spec.cpu_counts {
            if u64::from(moms) * u64::from(cpus) != spec.total_cpus {
                continue;
            }
            for &async_db in &spec.async_db {
                for &job_type in &spec.job_types {
                    let (total_num_jobs, num_subjobs) = match job_type {
                        JobType::JobArray => (100, 1000),
                        JobType::Job => (100_000, 0),
                    };
                    let scenario = ScenarioConfig {
                        total_num_svrs: 1,
                        total_num_moms: moms,
                        num_moms_per_host: 0,
                        num_cpus_per_mom: cpus,
                        num_vnodes_per_mom: spec.vnodes_per_mom,
                        async_db,
                        job_type,
                        total_num_jobs,
                        num_subjobs,
                    };
                    config
                        .setups
                        .entry(scenario_name(moms, cpus, async_db, job_type))
                        .or_insert(scenario);
                }
            }
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matrix_keeps_only_matching_totals() {
        let config = generate(&MatrixSpec::default());
        // 100 x 50 and 25 x 200, each with 2 db modes and 2 job types.
        assert_eq!(config.setups.len(), 8);
        assert!(config.setups.contains_key("100m50cpu_sync_j"));
        assert!(config.setups.contains_key("25m200cpu_async_ja"));
        assert!(!config.setups.contains_key("100m100cpu_sync_j"));
    }

    #[test]
    fn job_arrays_get_subjobs() {
        let config = generate(&MatrixSpec::default());
        let ja = config.scenario("100m50cpu_sync_ja").unwrap();
        assert_eq!(ja.total_num_jobs, 100);
        assert_eq!(ja.num_subjobs, 1000);
        let j = config.scenario("100m50cpu_async_j").unwrap();
        assert_eq!(j.total_num_jobs, 100_000);
        assert!(j.async_db);
    }
}
