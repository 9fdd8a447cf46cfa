//! `schedbench run`: the scenario driver.

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{error, info, warn};

use schedbench_core::{BenchConfig, Host, ScenarioConfig};
use schedbench_rollout::{
    HarnessSettings, RemoteExecutor, RolloutEngine, cleanup_hosts, cleanup_system, stage_artifacts,
};
use schedbench_topology::{ClusterRequest, encode, plan};

use super::{HarnessArgs, InputArgs};

const TEST_SCRIPT: &str = "run-test.sh";
const RESULTS_DIR: &str = "results";

/// What happened to one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Tested,
    Skipped,
}

/// Runs scenarios one after another against a fixed host list.
pub struct Driver {
    executor: Arc<dyn RemoteExecutor>,
    settings: Arc<HarnessSettings>,
    hosts: Vec<Host>,
    no_continue: bool,
}

impl Driver {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        settings: Arc<HarnessSettings>,
        hosts: Vec<Host>,
        no_continue: bool,
    ) -> Self {
        Self {
            executor,
            settings,
            hosts,
            no_continue,
        }
    }

    /// Plan, clean, and roll out one scenario. `true` when every node is up.
    pub async fn bring_up(&self, name: &str, scenario: &ScenarioConfig) -> bool {
        let request = ClusterRequest::from_scenario(scenario);
        let plan = match plan(&request, &self.hosts) {
            Ok(plan) => plan,
            Err(e) => {
                error!(scenario = name, error = %e, "invalid cluster layout");
                return false;
            }
        };
        let addressing = encode(&plan);
        info!(
            scenario = name,
            servers = plan.num_servers(),
            moms = plan.num_moms(),
            topology = %addressing.topology,
            "cluster planned"
        );

        cleanup_hosts(
            Arc::clone(&self.executor),
            &self.hosts,
            Arc::clone(&self.settings),
        )
        .await;

        let engine = RolloutEngine::new(Arc::clone(&self.executor), Arc::clone(&self.settings));
        engine.rollout(&plan, &addressing, &request).await.is_success()
    }

    pub async fn run_scenario(
        &self,
        name: &str,
        scenario: &ScenarioConfig,
    ) -> anyhow::Result<ScenarioOutcome> {
        info!(scenario = name, "configuring setup");
        if !self.bring_up(name, scenario).await {
            if self.no_continue {
                bail!("scenario {name} failed to come up");
            }
            warn!(scenario = name, "skipping test, see above for reason");
            return Ok(ScenarioOutcome::Skipped);
        }
        run_test_script(&self.settings, name, scenario).await?;
        Ok(ScenarioOutcome::Tested)
    }

    /// Run every scenario of `config` in file order.
    pub async fn run_all(
        &self,
        config: &BenchConfig,
    ) -> anyhow::Result<Vec<(String, ScenarioOutcome)>> {
        let mut outcomes = Vec::new();
        for (name, scenario) in config.scenarios() {
            let outcome = self.run_scenario(name, scenario).await?;
            outcomes.push((name.to_string(), outcome));
        }
        Ok(outcomes)
    }
}

/// `run-test.sh <name> <total_num_jobs> <job_type> <num_subjobs>`, run
/// locally from the workdir.
pub fn test_script_args(name: &str, scenario: &ScenarioConfig) -> Vec<String> {
    vec![
        name.to_string(),
        scenario.total_num_jobs.to_string(),
        scenario.job_type.tag().to_string(),
        scenario.num_subjobs.to_string(),
    ]
}

async fn run_test_script(
    settings: &HarnessSettings,
    name: &str,
    scenario: &ScenarioConfig,
) -> anyhow::Result<()> {
    let script = settings.workdir.join(TEST_SCRIPT);
    let status = tokio::process::Command::new(&script)
        .args(test_script_args(name, scenario))
        .current_dir(&settings.workdir)
        .status()
        .await
        .with_context(|| format!("failed to run {}", script.display()))?;
    if status.success() {
        info!(scenario = name, "test finished");
    } else {
        warn!(scenario = name, %status, "test script failed");
    }
    Ok(())
}

fn ensure_not_root() -> anyhow::Result<()> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } == 0 {
        bail!("schedbench must be run as a non-root user");
    }
    Ok(())
}

pub async fn run(inputs: &InputArgs, harness: &HarnessArgs, no_continue: bool) -> anyhow::Result<()> {
    ensure_not_root()?;

    let settings = Arc::new(harness.settings()?);
    let config = inputs.load_config(&settings)?;
    let hosts = inputs.load_hosts(&settings).await?;
    let archive = settings.image_archive_path();
    if !archive.is_file() {
        bail!("could not find {}", archive.display());
    }
    let executor = harness.executor(&settings, &hosts).await;
    info!(
        hosts = hosts.len(),
        scenarios = config.setups.len(),
        workdir = %settings.workdir.display(),
        "starting benchmark run"
    );

    cleanup_system(Arc::clone(&executor), &hosts, Arc::clone(&settings)).await;

    let results = settings.workdir.join(RESULTS_DIR);
    if results.exists() {
        std::fs::remove_dir_all(&results)
            .with_context(|| format!("failed to remove {}", results.display()))?;
    }

    for (host, ok) in stage_artifacts(Arc::clone(&executor), &hosts, Arc::clone(&settings)).await {
        if !ok {
            warn!(%host, "artifact staging failed");
        }
    }

    let driver = Driver::new(Arc::clone(&executor), Arc::clone(&settings), hosts.clone(), no_continue);
    let outcomes = driver.run_all(&config).await?;

    cleanup_system(executor, &hosts, settings).await;

    let skipped = outcomes
        .iter()
        .filter(|(_, o)| *o == ScenarioOutcome::Skipped)
        .count();
    info!(scenarios = outcomes.len(), skipped, "benchmark run complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;

    use schedbench_core::JobType;
    use schedbench_rollout::ExecFuture;

    use super::*;

    /// Succeeds unless an argument contains `fail_on`; listing returns nothing.
    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<Vec<String>>>,
        fail_on: Option<String>,
    }

    impl RemoteExecutor for RecordingExecutor {
        fn local_host(&self) -> &str {
            "local"
        }

        fn execute<'a>(&'a self, _host: &'a str, argv: &'a [String]) -> ExecFuture<'a, bool> {
            self.calls.lock().unwrap().push(argv.to_vec());
            let ok = match &self.fail_on {
                Some(needle) => !argv.iter().any(|a| a.contains(needle.as_str())),
                None => true,
            };
            Box::pin(async move { ok })
        }

        fn capture<'a>(
            &'a self,
            _host: &'a str,
            argv: &'a [String],
        ) -> ExecFuture<'a, Option<String>> {
            self.calls.lock().unwrap().push(argv.to_vec());
            Box::pin(async { Some(String::new()) })
        }
    }

    fn scenario(moms: u32, job_type: JobType) -> ScenarioConfig {
        ScenarioConfig {
            total_num_svrs: 1,
            total_num_moms: moms,
            num_moms_per_host: 0,
            num_cpus_per_mom: 10,
            num_vnodes_per_mom: 0,
            async_db: false,
            job_type,
            total_num_jobs: 100,
            num_subjobs: 1000,
        }
    }

    fn hosts() -> Vec<Host> {
        vec![
            Host::new("local", "10.0.0.1".parse().unwrap()),
            Host::new("b", "10.0.0.2".parse().unwrap()),
        ]
    }

    /// Workdir with a `run-test.sh` that appends its arguments to `ran`.
    fn workdir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join(TEST_SCRIPT);
        std::fs::write(&script, "#!/bin/sh\necho \"$@\" >> ran\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    fn driver(dir: &tempfile::TempDir, exec: RecordingExecutor, no_continue: bool) -> Driver {
        let settings = HarnessSettings {
            workdir: dir.path().to_path_buf(),
            ..Default::default()
        };
        Driver::new(Arc::new(exec), Arc::new(settings), hosts(), no_continue)
    }

    fn config(entries: Vec<(&str, ScenarioConfig)>) -> BenchConfig {
        let mut config = BenchConfig::default();
        for (name, s) in entries {
            config.setups.insert(name.to_string(), s);
        }
        config
    }

    #[test]
    fn script_arguments() {
        assert_eq!(
            test_script_args("x", &scenario(4, JobType::JobArray)),
            vec!["x", "100", "ja", "1000"]
        );
    }

    #[tokio::test]
    async fn successful_scenarios_run_the_test_script() {
        let dir = workdir();
        let d = driver(&dir, RecordingExecutor::default(), false);
        let outcomes = d
            .run_all(&config(vec![
                ("a", scenario(2, JobType::Job)),
                ("b", scenario(3, JobType::JobArray)),
            ]))
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![
                ("a".to_string(), ScenarioOutcome::Tested),
                ("b".to_string(), ScenarioOutcome::Tested)
            ]
        );
        let ran = std::fs::read_to_string(dir.path().join("ran")).unwrap();
        assert_eq!(ran, "a 100 j 1000\nb 100 ja 1000\n");
    }

    #[tokio::test]
    async fn failed_rollout_is_skipped() {
        let dir = workdir();
        let d = driver(
            &dir,
            RecordingExecutor {
                fail_on: Some("pbs-mom-1-1".to_string()),
                ..Default::default()
            },
            false,
        );
        let outcomes = d
            .run_all(&config(vec![
                ("a", scenario(1, JobType::Job)),
                ("b", scenario(2, JobType::Job)),
            ]))
            .await
            .unwrap();
        assert_eq!(outcomes[0].1, ScenarioOutcome::Tested);
        assert_eq!(outcomes[1].1, ScenarioOutcome::Skipped);
        let ran = std::fs::read_to_string(dir.path().join("ran")).unwrap();
        assert_eq!(ran, "a 100 j 1000\n");
    }

    #[tokio::test]
    async fn no_continue_stops_at_first_failure() {
        let dir = workdir();
        let d = driver(
            &dir,
            RecordingExecutor {
                fail_on: Some("pbs-server-1".to_string()),
                ..Default::default()
            },
            true,
        );
        let err = d
            .run_all(&config(vec![("a", scenario(1, JobType::Job))]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scenario a"));
        assert!(!dir.path().join("ran").exists());
    }

    #[tokio::test]
    async fn invalid_layout_is_skipped_without_touching_hosts() {
        let dir = workdir();
        let mut bad = scenario(0, JobType::Job);
        bad.num_moms_per_host = 0;
        let exec = Arc::new(RecordingExecutor::default());
        let settings = HarnessSettings {
            workdir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let d = Driver::new(exec.clone(), Arc::new(settings), hosts(), false);
        let outcome = d.run_scenario("bad", &bad).await.unwrap();
        assert_eq!(outcome, ScenarioOutcome::Skipped);
        assert!(exec.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn each_scenario_cleans_before_rollout() {
        let dir = workdir();
        let exec = Arc::new(RecordingExecutor::default());
        let settings = HarnessSettings {
            workdir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let d = Driver::new(exec.clone(), Arc::new(settings), hosts(), false);
        assert!(d.bring_up("a", &scenario(1, JobType::Job)).await);

        let calls = exec.calls.lock().unwrap().clone();
        let first_run = calls
            .iter()
            .position(|argv| argv.iter().any(|a| a == "--entrypoint"))
            .unwrap();
        let listings: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, argv)| argv.get(1).map(String::as_str) == Some("ps"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(listings.len(), 2);
        assert!(listings.iter().all(|&i| i < first_run));
    }
}
