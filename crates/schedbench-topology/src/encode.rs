//! Address and topology encoding.
//!
//! Renders a frozen [`ClusterPlan`] into the strings provisioning commands
//! consume: the list of server endpoints, the `--add-host` entries that make
//! server names resolvable inside containers, and the topology descriptor
//! that tells every server which moms are bound to it.
//!
//! Topology descriptor form, one segment per host that runs moms:
//!
//! ```text
//! <host>:<ordinal>@<idx>=<offset>,<idx>=<offset>+<ordinal>@<idx>=<offset>
//! ```
//!
//! Segments are joined with `-`. Host names may themselves contain `-`; the
//! part after `:` only ever holds digits and `@=,+`, which keeps parsing
//! unambiguous.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::TopologyParseError;
use crate::planner::ClusterPlan;

/// A mom as seen from its server: index and port offset from the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MomAddr {
    pub index: u32,
    pub offset: u16,
}

/// Moms on one host bound to one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerGroup {
    pub ordinal: u32,
    pub moms: Vec<MomAddr>,
}

/// All server groups for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostTopology {
    pub host: String,
    pub groups: Vec<ServerGroup>,
}

/// Which moms every server should expect, per host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologyDescriptor {
    pub hosts: Vec<HostTopology>,
}

impl TopologyDescriptor {
    /// `(index, offset)` pairs bound to `ordinal`, across all hosts.
    pub fn pairs_for_server(&self, ordinal: u32) -> Vec<MomAddr> {
        self.hosts
            .iter()
            .flat_map(|h| h.groups.iter())
            .filter(|g| g.ordinal == ordinal)
            .flat_map(|g| g.moms.iter().copied())
            .collect()
    }

    /// Number of moms a server must see before it counts as ready.
    pub fn moms_for_server(&self, ordinal: u32) -> usize {
        self.pairs_for_server(ordinal).len()
    }
}

impl fmt::Display for TopologyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (h, host) in self.hosts.iter().enumerate() {
            if h > 0 {
                f.write_str("-")?;
            }
            write!(f, "{}:", host.host)?;
            for (g, group) in host.groups.iter().enumerate() {
                if g > 0 {
                    f.write_str("+")?;
                }
                write!(f, "{}@", group.ordinal)?;
                for (m, mom) in group.moms.iter().enumerate() {
                    if m > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}={}", mom.index, mom.offset)?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for TopologyDescriptor {
    type Err = TopologyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hosts = Vec::new();
        let mut rest = s;
        let mut consumed = 0;

        while !rest.is_empty() {
            let colon = rest
                .find(':')
                .ok_or_else(|| TopologyParseError::MissingHost(rest.to_string()))?;
            let host = &rest[..colon];
            if host.is_empty() {
                return Err(TopologyParseError::EmptyHost(rest.to_string()));
            }
            let body_start = colon + 1;
            let body_len = rest[body_start..]
                .find(|c: char| !is_payload_char(c))
                .unwrap_or(rest.len() - body_start);
            let body = &rest[body_start..body_start + body_len];

            hosts.push(HostTopology {
                host: host.to_string(),
                groups: parse_groups(body)?,
            });

            let end = body_start + body_len;
            consumed += end;
            rest = &rest[end..];
            match rest.chars().next() {
                None => {}
                Some('-') if rest.len() > 1 => {
                    rest = &rest[1..];
                    consumed += 1;
                }
                Some(found) => {
                    return Err(TopologyParseError::Unexpected {
                        found,
                        offset: consumed,
                    });
                }
            }
        }

        Ok(TopologyDescriptor { hosts })
    }
}

fn is_payload_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '@' | '=' | ',' | '+')
}

fn parse_groups(body: &str) -> Result<Vec<ServerGroup>, TopologyParseError> {
    body.split('+')
        .map(|group| {
            let (ordinal, moms) = group
                .split_once('@')
                .ok_or_else(|| TopologyParseError::BadGroup(group.to_string()))?;
            let ordinal = ordinal
                .parse()
                .map_err(|_| TopologyParseError::BadGroup(group.to_string()))?;
            let moms = moms
                .split(',')
                .map(parse_mom)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ServerGroup { ordinal, moms })
        })
        .collect()
}

fn parse_mom(entry: &str) -> Result<MomAddr, TopologyParseError> {
    let bad = || TopologyParseError::BadMom(entry.to_string());
    let (index, offset) = entry.split_once('=').ok_or_else(bad)?;
    Ok(MomAddr {
        index: index.parse().map_err(|_| bad())?,
        offset: offset.parse().map_err(|_| bad())?,
    })
}

/// Wire-level addressing derived from a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterAddressing {
    /// `<server name>:<client port>` in allocation order.
    pub server_endpoints: Vec<String>,
    /// `<server name>:<host ip>` entries for container name resolution.
    pub host_entries: Vec<String>,
    /// Name of the primary server.
    pub first_server: String,
    pub topology: TopologyDescriptor,
}

impl ClusterAddressing {
    pub fn is_multi_server(&self) -> bool {
        self.server_endpoints.len() > 1
    }

    /// Comma-joined endpoint list passed to multi-server nodes.
    pub fn joined_endpoints(&self) -> String {
        self.server_endpoints.join(",")
    }

    /// Endpoint of the primary server.
    pub fn first_server_endpoint(&self) -> Option<&str> {
        self.server_endpoints.first().map(String::as_str)
    }
}

/// Derive the addressing for `plan`. Pure and deterministic.
pub fn encode(plan: &ClusterPlan) -> ClusterAddressing {
    let mut server_endpoints = Vec::new();
    let mut host_entries = Vec::new();
    for host in plan.hosts() {
        for server in host.servers() {
            server_endpoints.push(format!("{}:{}", server.name, server.ports.primary));
            host_entries.push(format!("{}:{}", server.name, host.host().ip));
        }
    }

    let mut hosts = Vec::new();
    for host in plan.hosts() {
        let mut groups: Vec<ServerGroup> = Vec::new();
        for mom in host.moms() {
            let addr = MomAddr {
                index: mom.index,
                offset: mom.ports.primary - plan.base_port(),
            };
            match groups.iter_mut().find(|g| g.ordinal == mom.server.ordinal) {
                Some(group) => group.moms.push(addr),
                None => groups.push(ServerGroup {
                    ordinal: mom.server.ordinal,
                    moms: vec![addr],
                }),
            }
        }
        if !groups.is_empty() {
            hosts.push(HostTopology {
                host: host.host().name.clone(),
                groups,
            });
        }
    }

    let first_server = plan
        .first_server()
        .map(|s| s.name.clone())
        .unwrap_or_default();

    ClusterAddressing {
        server_endpoints,
        host_entries,
        first_server,
        topology: TopologyDescriptor { hosts },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use schedbench_core::{Host, JobType};

    use super::*;
    use crate::planner::plan;
    use crate::request::ClusterRequest;

    fn hosts(names: &[&str]) -> Vec<Host> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Host::new(*n, format!("10.0.0.{}", i + 1).parse().unwrap()))
            .collect()
    }

    fn request(servers: u32, total_moms: u32, moms_per_host: u32) -> ClusterRequest {
        ClusterRequest {
            total_servers: servers,
            total_moms,
            moms_per_host,
            cpus_per_mom: 50,
            vnodes_per_mom: 0,
            async_db: false,
            job_type: JobType::Job,
        }
    }

    #[test]
    fn single_host_topology_string() {
        let plan = plan(&request(1, 3, 0), &hosts(&["node-a"])).unwrap();
        let addressing = encode(&plan);
        assert_eq!(addressing.server_endpoints, vec!["pbs-server-1:18000"]);
        assert_eq!(addressing.host_entries, vec!["pbs-server-1:10.0.0.1"]);
        assert_eq!(addressing.first_server, "pbs-server-1");
        assert_eq!(addressing.topology.to_string(), "node-a:1@0=2,1=4,2=6");
        assert!(!addressing.is_multi_server());
    }

    #[test]
    fn multi_host_topology_string() {
        let plan = plan(&request(2, 6, 0), &hosts(&["a", "b", "c", "d"])).unwrap();
        let addressing = encode(&plan);
        assert_eq!(
            addressing.joined_endpoints(),
            "pbs-server-1:18000,pbs-server-2:18002"
        );
        assert_eq!(
            addressing.topology.to_string(),
            "c:1@0=4,1=8+2@0=6-d:1@2=10,3=14+2@1=12"
        );
        assert_eq!(addressing.topology.moms_for_server(1), 4);
        assert_eq!(addressing.topology.moms_for_server(2), 2);
    }

    #[test]
    fn round_trip_preserves_pairs_per_server() {
        let host_list = hosts(&["node-1", "node-2", "rack-3-node-4"]);
        for (servers, total, per_host) in [(1, 7, 0), (2, 0, 3), (1, 0, 5), (2, 9, 0)] {
            let plan = plan(&request(servers, total, per_host), &host_list).unwrap();
            let topology = encode(&plan).topology;
            let parsed: TopologyDescriptor = topology.to_string().parse().unwrap();
            assert_eq!(parsed, topology);

            let mut expected: HashMap<u32, BTreeSet<(u32, u16)>> = HashMap::new();
            for mom in plan.moms() {
                expected
                    .entry(mom.server.ordinal)
                    .or_default()
                    .insert((mom.index, mom.ports.primary - plan.base_port()));
            }
            for (ordinal, pairs) in expected {
                let got: BTreeSet<(u32, u16)> = parsed
                    .pairs_for_server(ordinal)
                    .into_iter()
                    .map(|m| (m.index, m.offset))
                    .collect();
                assert_eq!(got, pairs);
            }
        }
    }

    #[test]
    fn identical_plans_encode_identically() {
        let h = hosts(&["a", "b", "c"]);
        let r = request(1, 5, 0);
        let a = encode(&plan(&r, &h).unwrap());
        let b = encode(&plan(&r, &h).unwrap());
        assert_eq!(a.topology.to_string(), b.topology.to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn parse_empty_string() {
        let parsed: TopologyDescriptor = "".parse().unwrap();
        assert!(parsed.hosts.is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("no-colon".parse::<TopologyDescriptor>().is_err());
        assert!("a:1@x=2".parse::<TopologyDescriptor>().is_err());
        assert!("a:1=2".parse::<TopologyDescriptor>().is_err());
        assert!("a:1@0=2-".parse::<TopologyDescriptor>().is_err());
        assert!(":1@0=2".parse::<TopologyDescriptor>().is_err());
    }

    #[test]
    fn addressing_serializes_to_json() {
        let plan = plan(&request(1, 2, 0), &hosts(&["a"])).unwrap();
        let json = serde_json::to_value(encode(&plan)).unwrap();
        assert_eq!(json["first_server"], "pbs-server-1");
        assert_eq!(json["topology"]["hosts"][0]["host"], "a");
    }
}
