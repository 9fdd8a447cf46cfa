//! Artifact staging: get the container image onto every host.
//!
//! Remote hosts receive the workdir artifacts over scp (run from the local
//! machine); every host then loads the image archive into its container
//! store.

use std::sync::Arc;

use tracing::{info, warn};

use schedbench_core::Host;

use crate::command;
use crate::executor::RemoteExecutor;
use crate::settings::HarnessSettings;

async fn stage_host(executor: &dyn RemoteExecutor, host: &str, settings: &HarnessSettings) -> bool {
    if !executor.is_local(host) {
        if !executor.execute(host, &command::make_dir(&settings.workdir)).await {
            warn!(%host, "could not create workdir");
            return false;
        }
        let copy = command::copy_artifacts(settings, host);
        if !executor.execute(executor.local_host(), &copy).await {
            warn!(%host, "artifact copy failed");
            return false;
        }
    }
    if !executor.execute(host, &command::load_image(settings)).await {
        warn!(%host, "image load failed");
        return false;
    }
    info!(%host, "artifacts staged");
    true
}

/// Stage artifacts on every host concurrently. Returns `(host, ok)` per
/// host in input order.
pub async fn stage_artifacts(
    executor: Arc<dyn RemoteExecutor>,
    hosts: &[Host],
    settings: Arc<HarnessSettings>,
) -> Vec<(String, bool)> {
    let handles: Vec<_> = hosts
        .iter()
        .map(|h| {
            let executor = Arc::clone(&executor);
            let settings = Arc::clone(&settings);
            let host = h.name.clone();
            let handle = tokio::spawn(async move {
                stage_host(executor.as_ref(), &host, &settings).await
            });
            (h.name.clone(), handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (host, handle) in handles {
        results.push((host, handle.await.unwrap_or(false)));
    }
    results
}
