pub mod clean;
pub mod genconf;
pub mod plan;
pub mod run;
pub mod stats;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::debug;

use schedbench_core::{BenchConfig, Host, hosts};
use schedbench_rollout::{HarnessSettings, RemoteExecutor, SshExecutor};

/// Options shared by every command that touches hosts.
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Directory holding pbs.tgz, entrypoint, and the test scripts
    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,
    /// TOML file with harness settings; flags below override it
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Container image to run
    #[arg(long)]
    pub image: Option<String>,
    /// Label put on (and used to find) every harness container
    #[arg(long)]
    pub label: Option<String>,
    /// Host directory mounted as the scheduler spool
    #[arg(long)]
    pub spool_dir: Option<PathBuf>,
    /// Maximum concurrent provisioning tasks
    #[arg(long)]
    pub max_parallel: Option<usize>,
    /// Abandon a remote command after this many seconds
    #[arg(long)]
    pub command_timeout: Option<u64>,
    /// Name of this machine as it appears in the host list
    #[arg(long)]
    pub local_host: Option<String>,
    /// Extra option passed to ssh (repeatable)
    #[arg(long = "ssh-option")]
    pub ssh_options: Vec<String>,
}

impl HarnessArgs {
    /// Resolve the effective settings. The workdir is made absolute since
    /// it is bind-mounted into containers at the same path.
    pub fn settings(&self) -> anyhow::Result<HarnessSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("invalid settings file {}", path.display()))?
            }
            None => HarnessSettings::default(),
        };

        settings.workdir = std::fs::canonicalize(&self.workdir)
            .with_context(|| format!("workdir {} not found", self.workdir.display()))?;
        if let Some(image) = &self.image {
            settings.image = image.clone();
        }
        if let Some(label) = &self.label {
            settings.label = label.clone();
        }
        if let Some(spool_dir) = &self.spool_dir {
            settings.spool_dir = spool_dir.clone();
        }
        if let Some(max_parallel) = self.max_parallel {
            settings.max_parallel = max_parallel;
        }
        if self.command_timeout.is_some() {
            settings.command_timeout_secs = self.command_timeout;
        }
        Ok(settings)
    }

    /// Build the executor. Host list entries that are this machine, by
    /// name or by address, run their commands without ssh.
    pub async fn executor(&self, settings: &HarnessSettings, hosts: &[Host]) -> Arc<dyn RemoteExecutor> {
        let executor = match &self.local_host {
            Some(name) => SshExecutor::new(name.clone()),
            None => SshExecutor::from_environment(),
        };
        let local_addrs = hosts::addresses_of(executor.local_host()).await;
        let aliases = hosts::local_aliases(hosts, executor.local_host(), &local_addrs);
        debug!(local = %executor.local_host(), ?aliases, "local host entries");
        Arc::new(
            executor
                .with_local_aliases(aliases)
                .with_ssh_options(self.ssh_options.clone())
                .with_timeout(settings.command_timeout_secs.map(Duration::from_secs)),
        )
    }
}

/// Scenario config and host list locations.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Scenario config (JSON, or TOML by extension), relative to the workdir
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,
    /// Host list file, relative to the workdir
    #[arg(short, long, default_value = "nodes")]
    pub nodes: PathBuf,
}

impl InputArgs {
    pub fn load_config(&self, settings: &HarnessSettings) -> anyhow::Result<BenchConfig> {
        let path = in_workdir(settings, &self.config);
        BenchConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))
    }

    pub async fn load_hosts(&self, settings: &HarnessSettings) -> anyhow::Result<Vec<Host>> {
        load_hosts(settings, &self.nodes).await
    }
}

/// Cycle-log statistics options.
#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Scheduler log directory
    #[arg(short, long, default_value = "/var/spool/pbs/sched_logs")]
    pub schedlogs: PathBuf,
    /// Percentiles to print
    #[arg(short, long, num_args = 1.., default_values_t = [90u32, 75, 25])]
    pub perc: Vec<u32>,
    /// Also count per-cycle job events
    #[arg(long = "stats")]
    pub detailed: bool,
    /// Report cycles longer than this many seconds
    #[arg(short, long, default_value = "1200")]
    pub long: u64,
    /// Full summaries of job events instead of averages (with --stats)
    #[arg(short, long)]
    pub verbose: bool,
    /// First log date to read (YYYYMMDD)
    #[arg(long, default_value = "0")]
    pub start: u32,
    /// Last log date to read (YYYYMMDD)
    #[arg(long, default_value = "99999999")]
    pub end: u32,
    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub(crate) fn in_workdir(settings: &HarnessSettings, path: &Path) -> PathBuf {
    settings.workdir.join(path)
}

pub(crate) async fn load_hosts(
    settings: &HarnessSettings,
    nodes: &Path,
) -> anyhow::Result<Vec<Host>> {
    let path = in_workdir(settings, nodes);
    hosts::load(&path)
        .await
        .with_context(|| format!("failed to load host list {}", path.display()))
}
