//! Host cleanup.
//!
//! Removes whatever a previous run left behind so a rollout starts from a
//! known-empty host. Cleanup is best-effort: a host with nothing to clean,
//! or one that cannot be reached, is not an error.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info};

use schedbench_core::Host;

use crate::command;
use crate::executor::RemoteExecutor;
use crate::settings::HarnessSettings;

/// Remove every labelled container on `host` and wipe its spool directory.
pub async fn cleanup_host(
    executor: Arc<dyn RemoteExecutor>,
    host: String,
    settings: Arc<HarnessSettings>,
) {
    info!(%host, "cleaning previous containers");

    let listing = executor
        .capture(&host, &command::list_containers(&settings))
        .await;
    let Some(listing) = listing else {
        debug!(%host, "could not list containers, nothing to clean");
        return;
    };

    let ids: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if !ids.is_empty() {
        let pool = Arc::new(Semaphore::new(settings.parallelism()));
        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let executor = Arc::clone(&executor);
                let pool = Arc::clone(&pool);
                let host = host.clone();
                tokio::spawn(async move {
                    let _permit = pool.acquire_owned().await.ok();
                    if !executor.execute(&host, &command::remove_container(&id)).await {
                        debug!(%host, container = %id, "container removal failed");
                    }
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    if !executor.execute(&host, &command::wipe_spool(&settings)).await {
        debug!(%host, "spool wipe failed");
    }
}

/// Clean every host concurrently, one task per host.
pub async fn cleanup_hosts(
    executor: Arc<dyn RemoteExecutor>,
    hosts: &[Host],
    settings: Arc<HarnessSettings>,
) {
    let handles: Vec<_> = hosts
        .iter()
        .map(|h| {
            tokio::spawn(cleanup_host(
                Arc::clone(&executor),
                h.name.clone(),
                Arc::clone(&settings),
            ))
        })
        .collect();
    for handle in handles {
        let _ = handle.await;
    }
}

/// Container cleanup plus removal of the harness image, on every host.
pub async fn cleanup_system(
    executor: Arc<dyn RemoteExecutor>,
    hosts: &[Host],
    settings: Arc<HarnessSettings>,
) {
    let handles: Vec<_> = hosts
        .iter()
        .map(|h| {
            let executor = Arc::clone(&executor);
            let settings = Arc::clone(&settings);
            let host = h.name.clone();
            tokio::spawn(async move {
                info!(%host, "cleaning system");
                cleanup_host(Arc::clone(&executor), host.clone(), Arc::clone(&settings)).await;
                if !executor.execute(&host, &command::remove_image(&settings)).await {
                    debug!(%host, "image removal failed");
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.await;
    }
}
