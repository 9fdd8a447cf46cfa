//! Harness settings: what gets run and how much of it at once.

use std::path::{Path, PathBuf};

/// Knobs shared by rollout, cleanup and staging.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Container image every node runs.
    pub image: String,
    /// `key=value` label put on every container the harness starts.
    pub label: String,
    /// Directory holding the image archive and scripts; mounted into every
    /// container at the same path and mirrored on every host.
    pub workdir: PathBuf,
    /// Host directory mounted as the scheduler's spool directory.
    pub spool_dir: PathBuf,
    /// Image used to wipe the spool directory during cleanup.
    pub cleanup_image: String,
    /// Image archive name, relative to `workdir`.
    pub image_archive: String,
    /// Files copied to remote hosts, relative to `workdir`.
    pub artifacts: Vec<String>,
    /// Maximum concurrent provisioning (and per-host removal) tasks.
    pub max_parallel: usize,
    /// Seconds before a single remote command is abandoned. None waits
    /// for the transport.
    pub command_timeout_secs: Option<u64>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            image: "pbs:latest".to_string(),
            label: "pbs=1".to_string(),
            workdir: PathBuf::from("."),
            spool_dir: PathBuf::from("/tmp/pbs"),
            cleanup_image: "centos:8".to_string(),
            image_archive: "pbs.tgz".to_string(),
            artifacts: vec![
                "pbs.tgz".to_string(),
                "entrypoint".to_string(),
                "submit-jobs.sh".to_string(),
            ],
            max_parallel: 10,
            command_timeout_secs: None,
        }
    }
}

impl HarnessSettings {
    /// Entrypoint script every container starts with.
    pub fn entrypoint(&self) -> PathBuf {
        self.workdir.join("entrypoint")
    }

    pub fn image_archive_path(&self) -> PathBuf {
        self.workdir.join(&self.image_archive)
    }

    pub fn artifact_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.artifacts.iter().map(|a| self.workdir.join(a))
    }

    /// Parent of the spool directory, mounted by the wipe container.
    pub fn spool_parent(&self) -> &Path {
        self.spool_dir.parent().unwrap_or(Path::new("/"))
    }

    pub fn parallelism(&self) -> usize {
        self.max_parallel.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = HarnessSettings::default();
        assert_eq!(s.image, "pbs:latest");
        assert_eq!(s.max_parallel, 10);
        assert_eq!(s.spool_parent(), Path::new("/tmp"));
    }

    #[test]
    fn paths_are_relative_to_workdir() {
        let s = HarnessSettings {
            workdir: PathBuf::from("/opt/bench"),
            ..Default::default()
        };
        assert_eq!(s.entrypoint(), PathBuf::from("/opt/bench/entrypoint"));
        assert_eq!(s.image_archive_path(), PathBuf::from("/opt/bench/pbs.tgz"));
        assert_eq!(s.artifact_paths().count(), 3);
    }

    #[test]
    fn zero_parallelism_is_clamped() {
        let s = HarnessSettings {
            max_parallel: 0,
            ..Default::default()
        };
        assert_eq!(s.parallelism(), 1);
    }

    #[test]
    fn deserializes_partial_json() {
        let s: HarnessSettings = serde_json::from_str(r#"{"max_parallel": 4}"#).unwrap();
        assert_eq!(s.max_parallel, 4);
        assert_eq!(s.label, "pbs=1");
    }
}
