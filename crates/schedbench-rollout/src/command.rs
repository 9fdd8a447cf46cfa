//! Container command builders.
//!
//! Every command the harness runs is built here as a plain argv, which
//! keeps the positional contract with the container entrypoint in one
//! place and lets tests assert on exact commands.

use schedbench_topology::{ClusterAddressing, ClusterRequest, MomSpec, NodeSpec, ServerSpec};

use crate::settings::HarnessSettings;

fn flag(value: bool) -> String {
    let v = if value { "1" } else { "0" };
    v.to_string()
}

fn path_arg(path: &std::path::Path) -> String {
    path.display().to_string()
}

/// `podman run` prefix shared by servers and moms, up to and including the
/// image name.
fn run_prefix(settings: &HarnessSettings, name: &str, addressing: &ClusterAddressing) -> Vec<String> {
    let workdir = path_arg(&settings.workdir);
    let mut argv: Vec<String> = [
        "podman", "run", "--network", "host", "-itd", "--rm", "-l",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    argv.push(settings.label.clone());
    argv.push("-v".to_string());
    argv.push(format!("{workdir}:{workdir}"));
    argv.push("-v".to_string());
    argv.push(format!("{}:/var/spool/pbs", path_arg(&settings.spool_dir)));
    argv.push("--entrypoint".to_string());
    argv.push(path_arg(&settings.entrypoint()));
    argv.push("--name".to_string());
    argv.push(name.to_string());
    argv.extend(
        addressing
            .host_entries
            .iter()
            .map(|entry| format!("--add-host={entry}")),
    );
    argv.push(settings.image.clone());
    argv
}

/// Start a server container.
pub fn server_run(
    settings: &HarnessSettings,
    server: &ServerSpec,
    addressing: &ClusterAddressing,
    request: &ClusterRequest,
) -> Vec<String> {
    let mut argv = run_prefix(settings, &server.name, addressing);
    argv.extend([
        server.path.clone(),
        "server".to_string(),
        server.ordinal.to_string(),
        flag(server.is_first),
        server.ports.primary.to_string(),
        server.ports.secondary.to_string(),
        flag(request.async_db),
        addressing.topology.to_string(),
        request.cpus_per_mom.to_string(),
        request.vnodes_per_mom.to_string(),
        addressing.first_server.clone(),
    ]);
    if addressing.is_multi_server() {
        argv.push(addressing.joined_endpoints());
    }
    argv
}

/// Start a mom container.
pub fn mom_run(
    settings: &HarnessSettings,
    mom: &MomSpec,
    addressing: &ClusterAddressing,
    request: &ClusterRequest,
) -> Vec<String> {
    let mut argv = run_prefix(settings, &mom.name, addressing);
    argv.extend([
        mom.path.clone(),
        "mom".to_string(),
        mom.ports.primary.to_string(),
        mom.server.name.clone(),
        mom.server.port.to_string(),
        mom.name.clone(),
        request.cpus_per_mom.to_string(),
        request.vnodes_per_mom.to_string(),
        addressing.first_server.clone(),
    ]);
    if addressing.is_multi_server() {
        argv.push(addressing.joined_endpoints());
    }
    argv
}

/// Provisioning command for any node.
pub fn provision(
    settings: &HarnessSettings,
    node: &NodeSpec,
    addressing: &ClusterAddressing,
    request: &ClusterRequest,
) -> Vec<String> {
    match node {
        NodeSpec::Server(server) => server_run(settings, server, addressing, request),
        NodeSpec::Mom(mom) => mom_run(settings, mom, addressing, request),
    }
}

/// Block until a server reports all of its moms.
pub fn wait_server(
    settings: &HarnessSettings,
    server: &ServerSpec,
    addressing: &ClusterAddressing,
    request: &ClusterRequest,
) -> Vec<String> {
    vec![
        "podman".to_string(),
        "exec".to_string(),
        server.name.clone(),
        path_arg(&settings.entrypoint()),
        "waitsvr".to_string(),
        server.ordinal.to_string(),
        addressing.topology.moms_for_server(server.ordinal).to_string(),
        flag(request.async_db),
        addressing.topology.to_string(),
        addressing
            .first_server_endpoint()
            .unwrap_or_default()
            .to_string(),
    ]
}

/// IDs of every container carrying the harness label.
pub fn list_containers(settings: &HarnessSettings) -> Vec<String> {
    vec![
        "podman".to_string(),
        "ps".to_string(),
        "-aqf".to_string(),
        format!("label={}", settings.label),
    ]
}

pub fn remove_container(id: &str) -> Vec<String> {
    ["podman", "rm", "-vf", id].iter().map(|s| s.to_string()).collect()
}

/// Wipe the spool directory from inside a throwaway container, so files
/// owned by container users go away too.
pub fn wipe_spool(settings: &HarnessSettings) -> Vec<String> {
    let spool_name = settings
        .spool_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    vec![
        "podman".to_string(),
        "run".to_string(),
        "--network".to_string(),
        "host".to_string(),
        "--rm".to_string(),
        "-l".to_string(),
        settings.label.clone(),
        "-v".to_string(),
        format!("{}:/tmp/htmp", path_arg(settings.spool_parent())),
        settings.cleanup_image.clone(),
        "rm".to_string(),
        "-rf".to_string(),
        format!("/tmp/htmp/{spool_name}"),
    ]
}

pub fn remove_image(settings: &HarnessSettings) -> Vec<String> {
    vec![
        "podman".to_string(),
        "rmi".to_string(),
        "-f".to_string(),
        settings.image.clone(),
    ]
}

pub fn load_image(settings: &HarnessSettings) -> Vec<String> {
    vec![
        "podman".to_string(),
        "load".to_string(),
        "-i".to_string(),
        path_arg(&settings.image_archive_path()),
        settings.image.clone(),
    ]
}

pub fn make_dir(path: &std::path::Path) -> Vec<String> {
    vec!["mkdir".to_string(), "-p".to_string(), path_arg(path)]
}

/// Copy the artifacts to `host`, run from the local machine.
pub fn copy_artifacts(settings: &HarnessSettings, host: &str) -> Vec<String> {
    let mut argv = vec!["scp".to_string(), "-p".to_string()];
    argv.extend(settings.artifact_paths().map(|p| path_arg(&p)));
    argv.push(format!("{host}:{}", path_arg(&settings.workdir)));
    argv
}
