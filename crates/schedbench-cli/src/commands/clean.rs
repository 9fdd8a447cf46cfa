use std::path::Path;
use std::sync::Arc;

use tracing::info;

use schedbench_rollout::cleanup_system;

use super::{HarnessArgs, load_hosts};

pub async fn clean(nodes: &Path, harness: &HarnessArgs) -> anyhow::Result<()> {
    let settings = Arc::new(harness.settings()?);
    let hosts = load_hosts(&settings, nodes).await?;
    let executor = harness.executor(&settings, &hosts).await;

    cleanup_system(executor, &hosts, settings).await;
    info!(hosts = hosts.len(), "system cleanup finished");
    Ok(())
}
