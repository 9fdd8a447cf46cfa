//! Scenario configuration parser.
//!
//! The config file holds a map of named setups. JSON (`config.json`) is the
//! native format; files ending in `.toml` are read as TOML with the same
//! layout.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::JobType;

/// One named cluster-sizing and workload configuration.
///
/// Field names match the on-disk keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub total_num_svrs: u32,
    /// Total compute-nodes across all hosts. Mutually exclusive with
    /// `num_moms_per_host`.
    #[serde(default)]
    pub total_num_moms: u32,
    #[serde(default)]
    pub num_moms_per_host: u32,
    pub num_cpus_per_mom: u32,
    #[serde(default)]
    pub num_vnodes_per_mom: u32,
    #[serde(default)]
    pub async_db: bool,
    pub job_type: JobType,
    pub total_num_jobs: u64,
    #[serde(default)]
    pub num_subjobs: u64,
}

/// The full benchmark configuration: every scenario to run, by name, in
/// the order the file lists them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub setups: IndexMap<String, ScenarioConfig>,
}

impl BenchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path.extension().is_some_and(|ext| ext == "toml") {
            Ok(toml::from_str(&content)?)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a single scenario by name.
    pub fn scenario(&self, name: &str) -> ConfigResult<&ScenarioConfig> {
        self.setups
            .get(name)
            .ok_or_else(|| ConfigError::ScenarioNotFound(name.to_string()))
    }

    /// Scenarios in run order (as listed in the file).
    pub fn scenarios(&self) -> impl Iterator<Item = (&str, &ScenarioConfig)> {
        self.setups.iter().map(|(name, s)| (name.as_str(), s))
    }
}
