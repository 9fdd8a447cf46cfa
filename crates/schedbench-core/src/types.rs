//! Shared types used across schedbench crates.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A machine taking part in a benchmark run.
///
/// The host list order is significant: it drives every round-robin
/// decision the topology planner makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Host name as used for remote execution (ssh target).
    pub name: String,
    /// Address other cluster members use to reach this host.
    pub ip: IpAddr,
}

impl Host {
    pub fn new(name: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Kind of workload submitted once a cluster is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Plain single jobs.
    #[serde(rename = "j")]
    Job,
    /// Job arrays with `num_subjobs` subjobs each.
    #[serde(rename = "ja")]
    JobArray,
}

impl JobType {
    /// Short tag passed to the test runner script.
    pub fn tag(&self) -> &'static str {
        match self {
            JobType::Job => "j",
            JobType::JobArray => "ja",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
