//! Host list (`nodes` file) loading.
//!
//! One host per line. Blank lines and `#` comments are skipped. An optional
//! second column pins the host's address; otherwise it is resolved through
//! DNS.

use std::net::IpAddr;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Host;

/// A host list line before address resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub name: String,
    pub ip: Option<IpAddr>,
}

/// Parse the contents of a host list file.
pub fn parse_host_list(content: &str) -> ConfigResult<Vec<HostEntry>> {
    let mut entries = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else { continue };
        let ip = match fields.next() {
            Some(addr) => Some(addr.parse::<IpAddr>().map_err(|e| {
                ConfigError::InvalidHost {
                    line: idx + 1,
                    reason: format!("bad address {addr:?}: {e}"),
                }
            })?),
            None => None,
        };
        if let Some(extra) = fields.next() {
            return Err(ConfigError::InvalidHost {
                line: idx + 1,
                reason: format!("unexpected field {extra:?}"),
            });
        }
        entries.push(HostEntry {
            name: name.to_string(),
            ip,
        });
    }
    Ok(entries)
}

/// Resolve every entry to a [`Host`], keeping input order.
pub async fn resolve(entries: Vec<HostEntry>) -> ConfigResult<Vec<Host>> {
    let mut hosts = Vec::with_capacity(entries.len());
    for entry in entries {
        let ip = match entry.ip {
            Some(ip) => ip,
            None => lookup(&entry.name).await?,
        };
        debug!(host = %entry.name, %ip, "resolved host");
        hosts.push(Host::new(entry.name, ip));
    }
    Ok(hosts)
}

async fn lookup(name: &str) -> ConfigResult<IpAddr> {
    let mut addrs = tokio::net::lookup_host((name, 0))
        .await
        .map_err(|e| ConfigError::Resolve {
            host: name.to_string(),
            reason: e.to_string(),
        })?;
    addrs
        .find(|a| a.is_ipv4())
        .map(|a| a.ip())
        .ok_or_else(|| ConfigError::Resolve {
            host: name.to_string(),
            reason: "no IPv4 address".to_string(),
        })
}

/// Whether two host names refer to the same machine. Names compare
/// case-insensitively, and a bare short name matches any fully qualified
/// name with the same first label (`node1` and `node1.example.com`).
pub fn same_host_name(a: &str, b: &str) -> bool {
    let a = a.trim_end_matches('.');
    let b = b.trim_end_matches('.');
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let (short_a, domain_a) = a.split_once('.').unwrap_or((a, ""));
    let (short_b, domain_b) = b.split_once('.').unwrap_or((b, ""));
    (domain_a.is_empty() || domain_b.is_empty()) && short_a.eq_ignore_ascii_case(short_b)
}

/// Every address `name` resolves to. Empty when it does not resolve.
pub async fn addresses_of(name: &str) -> Vec<IpAddr> {
    match tokio::net::lookup_host((name, 0)).await {
        Ok(addrs) => addrs.map(|a| a.ip()).collect(),
        Err(e) => {
            debug!(host = %name, error = %e, "could not resolve local name");
            Vec::new()
        }
    }
}

/// Names of the host list entries that are this machine: same name as
/// `local_name`, a loopback address, or one of `local_addrs`.
pub fn local_aliases(hosts: &[Host], local_name: &str, local_addrs: &[IpAddr]) -> Vec<String> {
    hosts
        .iter()
        .filter(|h| {
            same_host_name(&h.name, local_name)
                || h.ip.is_loopback()
                || local_addrs.contains(&h.ip)
        })
        .map(|h| h.name.clone())
        .collect()
}

/// Read, parse and resolve a host list file. An empty list is an error.
pub async fn load(path: &Path) -> ConfigResult<Vec<Host>> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let entries = parse_host_list(&content)?;
    if entries.is_empty() {
        return Err(ConfigError::NoHosts(path.display().to_string()));
    }
    resolve(entries).await
}
