//! Rollout engine: brings every node of a plan up in parallel.
//!
//! One task per node is submitted, in order, to a pool bounded by
//! `HarnessSettings::max_parallel`. Servers additionally wait for their
//! moms once their own container is up. Every task runs to completion even
//! if siblings fail; the verdict is decided only after all have joined.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use schedbench_core::Host;
use schedbench_topology::{ClusterAddressing, ClusterPlan, ClusterRequest, NodeSpec};

use crate::command;
use crate::executor::RemoteExecutor;
use crate::settings::HarnessSettings;

/// Result of provisioning one node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NodeOutcome {
    pub name: String,
    pub host: String,
    pub ok: bool,
}

/// Outcomes of a whole rollout.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RolloutReport {
    pub outcomes: Vec<NodeOutcome>,
}

impl RolloutReport {
    /// The cluster is up iff at least one node was provisioned and none
    /// failed.
    pub fn is_success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.outcomes.iter().filter(|o| !o.ok)
    }

    pub fn num_failed(&self) -> usize {
        self.failed().count()
    }
}

/// A node's commands, built before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionTask {
    pub host: String,
    pub name: String,
    pub run: Vec<String>,
    /// Readiness wait, run only after `run` succeeded (servers only).
    pub wait: Option<Vec<String>>,
}

impl ProvisionTask {
    fn new(
        settings: &HarnessSettings,
        host: &Host,
        node: &NodeSpec,
        addressing: &ClusterAddressing,
        request: &ClusterRequest,
    ) -> Self {
        let wait = match node {
            NodeSpec::Server(server) => Some(command::wait_server(
                settings, server, addressing, request,
            )),
            NodeSpec::Mom(_) => None,
        };
        Self {
            host: host.name.clone(),
            name: node.name().to_string(),
            run: command::provision(settings, node, addressing, request),
            wait,
        }
    }
}

/// Build the provisioning tasks for a plan: every mom, then every server.
pub fn provision_tasks(
    settings: &HarnessSettings,
    plan: &ClusterPlan,
    addressing: &ClusterAddressing,
    request: &ClusterRequest,
) -> Vec<ProvisionTask> {
    let moms = plan.hosts().iter().flat_map(|h| {
        h.moms()
            .iter()
            .map(move |m| (h.host(), NodeSpec::Mom(m.clone())))
    });
    let servers = plan.hosts().iter().flat_map(|h| {
        h.servers()
            .iter()
            .map(move |s| (h.host(), NodeSpec::Server(s.clone())))
    });
    moms.chain(servers)
        .map(|(host, node)| ProvisionTask::new(settings, host, &node, addressing, request))
        .collect()
}

/// Drives cluster bring-up through a [`RemoteExecutor`].
pub struct RolloutEngine {
    executor: Arc<dyn RemoteExecutor>,
    settings: Arc<HarnessSettings>,
}

impl RolloutEngine {
    pub fn new(executor: Arc<dyn RemoteExecutor>, settings: Arc<HarnessSettings>) -> Self {
        Self { executor, settings }
    }

    /// Create the spool directory on every host of the plan.
    pub async fn prepare_hosts(&self, plan: &ClusterPlan) {
        let argv = command::make_dir(&self.settings.spool_dir);
        for host in plan.hosts() {
            if !self.executor.execute(&host.host().name, &argv).await {
                warn!(host = %host.host(), "could not create spool directory");
            }
        }
    }

    /// Provision every node of `plan` and report per-node outcomes.
    pub async fn rollout(
        &self,
        plan: &ClusterPlan,
        addressing: &ClusterAddressing,
        request: &ClusterRequest,
    ) -> RolloutReport {
        self.prepare_hosts(plan).await;

        let tasks = provision_tasks(&self.settings, plan, addressing, request);
        info!(
            nodes = tasks.len(),
            parallel = self.settings.parallelism(),
            "starting rollout"
        );
        let report = self.dispatch(tasks).await;

        if report.is_success() {
            info!(nodes = report.outcomes.len(), "cluster is up");
        } else {
            error!(
                failed = report.num_failed(),
                nodes = report.outcomes.len(),
                "cluster rollout failed"
            );
        }
        report
    }

    /// Run `tasks` on a bounded pool and wait for all of them.
    ///
    /// Permits are taken here, before each spawn, so tasks start in
    /// submission order: every mom holds or has released a permit before
    /// any server can begin its readiness wait.
    pub async fn dispatch(&self, tasks: Vec<ProvisionTask>) -> RolloutReport {
        let pool = Arc::new(Semaphore::new(self.settings.parallelism()));

        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let permit = Arc::clone(&pool).acquire_owned().await.ok();
            let executor = Arc::clone(&self.executor);
            let ident = (task.name.clone(), task.host.clone());
            let handle = tokio::spawn(async move {
                let _permit = permit;
                provision_node(executor.as_ref(), &task).await
            });
            handles.push((ident, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for ((name, host), handle) in handles {
            let ok = match handle.await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!(node = %name, %host, error = %e, "provisioning task panicked");
                    false
                }
            };
            outcomes.push(NodeOutcome { name, host, ok });
        }
        RolloutReport { outcomes }
    }
}

async fn provision_node(executor: &dyn RemoteExecutor, task: &ProvisionTask) -> bool {
    if !executor.execute(&task.host, &task.run).await {
        warn!(node = %task.name, host = %task.host, "failed to start node");
        return false;
    }
    if let Some(wait) = &task.wait {
        if !executor.execute(&task.host, wait).await {
            warn!(node = %task.name, host = %task.host, "server did not become ready");
            return false;
        }
    }
    info!(node = %task.name, host = %task.host, "configured node");
    true
}
