//! Topology planner: lays a cluster out over the host list.
//!
//! Given a [`ClusterRequest`] and the ordered hosts, the planner decides:
//! 1. How many servers and moms each host runs (round-robin)
//! 2. Which two ports every node listens on (one shared counter)
//! 3. Which server each mom is bound to (round-robin over all servers)
//!
//! All counters live in a [`Planner`] created per call, so two scenarios
//! never share planning state. The result is a frozen [`ClusterPlan`].

use serde::Serialize;
use tracing::{debug, info};

use schedbench_core::Host;

use crate::error::{PlanError, PlanResult};
use crate::request::{ClusterRequest, MomLayout};

/// First port handed out. Topology offsets are relative to this.
pub const BASE_PORT: u16 = 18000;

/// Storage path every node is provisioned with.
const DEFAULT_STORAGE_PATH: &str = "default";

/// Ports reserved for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortPair {
    /// Listening port (server client port, mom service port).
    pub primary: u16,
    /// Secondary port, always `primary + 1`.
    pub secondary: u16,
}

impl PortPair {
    fn starting_at(port: u16) -> Self {
        Self {
            primary: port,
            secondary: port + 1,
        }
    }
}

/// A server process to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSpec {
    pub name: String,
    pub path: String,
    /// 1-based position in allocation order.
    pub ordinal: u32,
    pub is_first: bool,
    pub ports: PortPair,
}

/// The server a mom reports to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRef {
    pub ordinal: u32,
    pub name: String,
    pub port: u16,
}

/// A mom (compute-node) process to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MomSpec {
    pub name: String,
    pub path: String,
    /// 0-based index among the moms bound to the same server.
    pub index: u32,
    pub ports: PortPair,
    pub server: ServerRef,
}

/// One provisionable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum NodeSpec {
    Server(ServerSpec),
    Mom(MomSpec),
}

impl NodeSpec {
    pub fn name(&self) -> &str {
        match self {
            NodeSpec::Server(s) => &s.name,
            NodeSpec::Mom(m) => &m.name,
        }
    }

    pub fn ports(&self) -> PortPair {
        match self {
            NodeSpec::Server(s) => s.ports,
            NodeSpec::Mom(m) => m.ports,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            NodeSpec::Server(_) => "server",
            NodeSpec::Mom(_) => "mom",
        }
    }
}

/// Everything planned for a single host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostPlan {
    host: Host,
    servers: Vec<ServerSpec>,
    moms: Vec<MomSpec>,
}

impl HostPlan {
    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn servers(&self) -> &[ServerSpec] {
        &self.servers
    }

    pub fn moms(&self) -> &[MomSpec] {
        &self.moms
    }

    /// Moms first, then servers.
    pub fn nodes(&self) -> impl Iterator<Item = NodeSpec> + '_ {
        self.moms
            .iter()
            .cloned()
            .map(NodeSpec::Mom)
            .chain(self.servers.iter().cloned().map(NodeSpec::Server))
    }
}

/// A frozen cluster layout. Read-only once returned from [`plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterPlan {
    base_port: u16,
    hosts: Vec<HostPlan>,
}

impl ClusterPlan {
    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    pub fn hosts(&self) -> &[HostPlan] {
        &self.hosts
    }

    /// Servers in allocation order.
    pub fn servers(&self) -> impl Iterator<Item = &ServerSpec> {
        self.hosts.iter().flat_map(|h| h.servers.iter())
    }

    pub fn moms(&self) -> impl Iterator<Item = &MomSpec> {
        self.hosts.iter().flat_map(|h| h.moms.iter())
    }

    /// Every node paired with the host it runs on.
    pub fn nodes(&self) -> impl Iterator<Item = (&Host, NodeSpec)> {
        self.hosts
            .iter()
            .flat_map(|h| h.nodes().map(move |n| (&h.host, n)))
    }

    pub fn num_servers(&self) -> usize {
        self.servers().count()
    }

    pub fn num_moms(&self) -> usize {
        self.moms().count()
    }

    /// The primary server (ordinal 1). Every valid plan has one.
    pub fn first_server(&self) -> Option<&ServerSpec> {
        self.servers().find(|s| s.is_first)
    }

    /// Host running the given server.
    pub fn host_of_server(&self, ordinal: u32) -> Option<&Host> {
        self.hosts
            .iter()
            .find(|h| h.servers.iter().any(|s| s.ordinal == ordinal))
            .map(|h| &h.host)
    }
}

/// Per-host counts and ports while the plan is being built.
#[derive(Debug, Default)]
struct HostDraft {
    num_servers: u32,
    num_moms: u32,
    servers: Vec<ServerSpec>,
    mom_ports: Vec<PortPair>,
}

/// Mutable planning context, owned by a single [`plan`] call.
struct Planner<'a> {
    request: &'a ClusterRequest,
    hosts: &'a [Host],
    drafts: Vec<HostDraft>,
    next_port: u16,
}

/// Compute the cluster layout for `request` over `hosts`.
///
/// Fails with [`PlanError::InvalidConfiguration`] before anything is
/// provisioned if the request cannot be laid out.
pub fn plan(request: &ClusterRequest, hosts: &[Host]) -> PlanResult<ClusterPlan> {
    let layout = validate(request, hosts)?;

    let mut planner = Planner {
        request,
        hosts,
        drafts: hosts.iter().map(|_| HostDraft::default()).collect(),
        next_port: BASE_PORT,
    };

    planner.distribute_servers();
    planner.distribute_moms(layout);
    planner.check_port_range()?;
    planner.allocate_ports();
    let plan = planner.bind_and_freeze();

    info!(
        hosts = hosts.len(),
        servers = plan.num_servers(),
        moms = plan.num_moms(),
        "cluster plan computed"
    );
    Ok(plan)
}

fn validate(request: &ClusterRequest, hosts: &[Host]) -> PlanResult<MomLayout> {
    let layout = request.mom_layout()?;

    if hosts.is_empty() {
        return Err(PlanError::InvalidConfiguration(
            "no hosts to plan on".to_string(),
        ));
    }
    if request.total_servers == 0 {
        return Err(PlanError::InvalidConfiguration(
            "total_num_svrs must be at least 1".to_string(),
        ));
    }
    // Moms avoid server hosts in a multi-host layout, so one must be free.
    if let MomLayout::Total(_) = layout {
        if hosts.len() > 1 && request.total_servers as usize >= hosts.len() {
            return Err(PlanError::InvalidConfiguration(format!(
                "{} servers occupy all {} hosts, leaving none for moms",
                request.total_servers,
                hosts.len()
            )));
        }
    }
    Ok(layout)
}

impl Planner<'_> {
    fn distribute_servers(&mut self) {
        let n = self.hosts.len();
        for k in 0..self.request.total_servers as usize {
            self.drafts[k % n].num_servers += 1;
        }
    }

    fn distribute_moms(&mut self, layout: MomLayout) {
        match layout {
            MomLayout::PerHost(per_host) => {
                for draft in &mut self.drafts {
                    draft.num_moms = per_host;
                }
            }
            MomLayout::Total(total) => {
                let targets: Vec<usize> = if self.drafts.len() == 1 {
                    vec![0]
                } else {
                    (0..self.drafts.len())
                        .filter(|&i| self.drafts[i].num_servers == 0)
                        .collect()
                };
                // validate() guarantees at least one target.
                for k in 0..total as usize {
                    self.drafts[targets[k % targets.len()]].num_moms += 1;
                }
            }
        }
        for (host, draft) in self.hosts.iter().zip(&self.drafts) {
            debug!(
                host = %host,
                servers = draft.num_servers,
                moms = draft.num_moms,
                "host assignment"
            );
        }
    }

    fn check_port_range(&self) -> PlanResult<()> {
        let nodes: u64 = self
            .drafts
            .iter()
            .map(|d| u64::from(d.num_servers) + u64::from(d.num_moms))
            .sum();
        // Each node takes two consecutive ports; the last one must still fit.
        let last = u64::from(BASE_PORT) + 2 * nodes - 1;
        if last > u64::from(u16::MAX) {
            return Err(PlanError::InvalidConfiguration(format!(
                "{nodes} nodes need ports up to {last}, beyond the port range"
            )));
        }
        Ok(())
    }

    fn take_ports(&mut self) -> PortPair {
        let pair = PortPair::starting_at(self.next_port);
        self.next_port = self.next_port.saturating_add(2);
        pair
    }

    fn allocate_ports(&mut self) {
        let mut ordinal = 1;
        for i in 0..self.drafts.len() {
            for _ in 0..self.drafts[i].num_servers {
                let ports = self.take_ports();
                self.drafts[i].servers.push(ServerSpec {
                    name: format!("pbs-server-{ordinal}"),
                    path: DEFAULT_STORAGE_PATH.to_string(),
                    ordinal,
                    is_first: ordinal == 1,
                    ports,
                });
                ordinal += 1;
            }
            for _ in 0..self.drafts[i].num_moms {
                let ports = self.take_ports();
                self.drafts[i].mom_ports.push(ports);
            }
        }
    }

    /// Bind every mom to a server and name it, then freeze the plan.
    ///
    /// On each host the n-th mom goes to the n-th server of the global
    /// server list (wrapping), so the sweep restarts for every host and
    /// ignores locality.
    fn bind_and_freeze(self) -> ClusterPlan {
        let servers: Vec<ServerSpec> = self
            .drafts
            .iter()
            .flat_map(|d| d.servers.iter().cloned())
            .collect();
        let mut next_index = vec![0u32; servers.len()];

        let hosts = self
            .hosts
            .iter()
            .zip(self.drafts)
            .map(|(host, draft)| {
                let moms = draft
                    .mom_ports
                    .iter()
                    .enumerate()
                    .map(|(i, &ports)| {
                        let slot = i % servers.len();
                        let server = &servers[slot];
                        let index = next_index[slot];
                        next_index[slot] += 1;
                        MomSpec {
                            name: format!("pbs-mom-{}-{index}", server.ordinal),
                            path: DEFAULT_STORAGE_PATH.to_string(),
                            index,
                            ports,
                            server: ServerRef {
                                ordinal: server.ordinal,
                                name: server.name.clone(),
                                port: server.ports.primary,
                            },
                        }
                    })
                    .collect();
                HostPlan {
                    host: host.clone(),
                    servers: draft.servers,
                    moms,
                }
            })
            .collect();

        ClusterPlan {
            base_port: BASE_PORT,
            hosts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use schedbench_core::JobType;

    use super::*;

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

    fn all_ports(plan: &ClusterPlan) -> Vec<u16> {
        plan.nodes()
            .flat_map(|(_, n)| {
                let p = n.ports();
                [p.primary, p.secondary]
            })
            .collect()
    }

    #[test]
    fn single_host_places_everything_together() {
        let plan = plan(&request(1, 3, 0), &hosts(&["a"])).unwrap();

        let host = &plan.hosts()[0];
        assert_eq!(host.servers().len(), 1);
        assert_eq!(host.moms().len(), 3);
        assert!(host.moms().iter().all(|m| m.server.name == "pbs-server-1"));

        let ports = all_ports(&plan);
        assert_eq!(ports.len(), 8);
        assert_eq!(ports.iter().collect::<HashSet<_>>().len(), 8);
    }

    #[test]
    fn single_host_ports_follow_allocation_order() {
        let plan = plan(&request(1, 3, 0), &hosts(&["a"])).unwrap();
        let server = plan.first_server().unwrap();
        assert_eq!(server.ports, PortPair { primary: 18000, secondary: 18001 });
        let mom_ports: Vec<u16> = plan.moms().map(|m| m.ports.primary).collect();
        assert_eq!(mom_ports, vec![18002, 18004, 18006]);
        let names: Vec<&str> = plan.moms().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["pbs-mom-1-0", "pbs-mom-1-1", "pbs-mom-1-2"]);
    }

    #[test]
    fn moms_skip_server_hosts() {
        let plan = plan(&request(1, 4, 0), &hosts(&["a", "b", "c"])).unwrap();
        let counts: Vec<(usize, usize)> = plan
            .hosts()
            .iter()
            .map(|h| (h.servers().len(), h.moms().len()))
            .collect();
        assert_eq!(counts, vec![(1, 0), (0, 2), (0, 2)]);
    }

    #[test]
    fn all_hosts_holding_servers_is_rejected() {
        let err = plan(&request(2, 4, 0), &hosts(&["a", "b"])).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration(_)));
    }

    #[test]
    fn servers_wrap_around_hosts() {
        let plan = plan(&request(5, 0, 1), &hosts(&["a", "b"])).unwrap();
        let per_host: Vec<Vec<u32>> = plan
            .hosts()
            .iter()
            .map(|h| h.servers().iter().map(|s| s.ordinal).collect())
            .collect();
        // Ordinals follow allocation order: host a first, then host b.
        assert_eq!(per_host, vec![vec![1, 2, 3], vec![4, 5]]);
        assert_eq!(plan.num_servers(), 5);
    }

    #[test]
    fn per_host_layout_puts_moms_everywhere() {
        let plan = plan(&request(2, 0, 3), &hosts(&["a", "b", "c"])).unwrap();
        assert_eq!(plan.num_moms(), 9);
        assert!(plan.hosts().iter().all(|h| h.moms().len() == 3));
    }

    #[test]
    fn binding_restarts_at_first_server_per_host() {
        let plan = plan(&request(2, 6, 0), &hosts(&["a", "b", "c", "d"])).unwrap();
        // Servers on a and b; moms on c (3) and d (3).
        let bound: Vec<Vec<u32>> = plan
            .hosts()
            .iter()
            .map(|h| h.moms().iter().map(|m| m.server.ordinal).collect())
            .collect();
        assert_eq!(bound, vec![vec![], vec![], vec![1, 2, 1], vec![1, 2, 1]]);

        let names: Vec<&str> = plan.moms().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "pbs-mom-1-0",
                "pbs-mom-2-0",
                "pbs-mom-1-1",
                "pbs-mom-1-2",
                "pbs-mom-2-1",
                "pbs-mom-1-3"
            ]
        );
    }

    #[test]
    fn every_mom_binds_an_existing_server() {
        let plan = plan(&request(3, 0, 4), &hosts(&["a", "b", "c", "d"])).unwrap();
        let servers: HashSet<(u32, &str, u16)> = plan
            .servers()
            .map(|s| (s.ordinal, s.name.as_str(), s.ports.primary))
            .collect();
        for mom in plan.moms() {
            assert!(servers.contains(&(
                mom.server.ordinal,
                mom.server.name.as_str(),
                mom.server.port
            )));
        }
    }

    #[test]
    fn ports_unique_and_above_base_across_layouts() {
        let host_list = hosts(&["a", "b", "c", "d", "e"]);
        for servers in 1..=4 {
            for moms in 1..=12 {
                let plan = plan(&request(servers, moms, 0), &host_list).unwrap();
                assert_eq!(plan.num_servers(), servers as usize);
                assert_eq!(plan.num_moms(), moms as usize);
                let ports = all_ports(&plan);
                assert!(ports.iter().all(|&p| p >= BASE_PORT));
                assert_eq!(ports.iter().collect::<HashSet<_>>().len(), ports.len());
            }
        }
    }

    #[test]
    fn per_host_ports_unique_and_above_base_across_layouts() {
        let host_list = hosts(&["a", "b", "c", "d", "e"]);
        for servers in 1..=4 {
            for per_host in 1..=6 {
                let plan = plan(&request(servers, 0, per_host), &host_list).unwrap();
                assert_eq!(plan.num_servers(), servers as usize);
                assert_eq!(plan.num_moms(), (per_host * 5) as usize);
                let ports = all_ports(&plan);
                assert_eq!(ports.len(), 2 * (servers + per_host * 5) as usize);
                assert!(ports.iter().all(|&p| p >= BASE_PORT));
                assert_eq!(ports.iter().collect::<HashSet<_>>().len(), ports.len());
            }
        }
    }

    #[test]
    fn contradictory_mom_dimensions_rejected() {
        let h = hosts(&["a"]);
        assert!(plan(&request(1, 0, 0), &h).is_err());
        assert!(plan(&request(1, 4, 2), &h).is_err());
    }

    #[test]
    fn empty_host_list_rejected() {
        assert!(matches!(
            plan(&request(1, 2, 0), &[]),
            Err(PlanError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn zero_servers_rejected() {
        assert!(plan(&request(0, 0, 2), &hosts(&["a", "b"])).is_err());
    }

    #[test]
    fn port_range_overflow_rejected() {
        let err = plan(&request(1, 30_000, 0), &hosts(&["a"])).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration(_)));
    }

    #[test]
    fn port_range_exact_fit_accepted() {
        // 23768 nodes use every pair from 18000 up to 65534/65535.
        let fit = plan(&request(1, 23_767, 0), &hosts(&["a"])).unwrap();
        let last = fit.moms().last().unwrap();
        assert_eq!(last.ports, PortPair { primary: 65534, secondary: 65535 });

        let err = plan(&request(1, 23_768, 0), &hosts(&["a"])).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration(_)));
    }

    #[test]
    fn planning_is_deterministic() {
        let h = hosts(&["a", "b", "c"]);
        let r = request(2, 0, 2);
        assert_eq!(plan(&r, &h).unwrap(), plan(&r, &h).unwrap());
    }

    #[test]
    fn host_of_server_finds_placement() {
        let plan = plan(&request(2, 0, 1), &hosts(&["a", "b"])).unwrap();
        assert_eq!(plan.host_of_server(2).unwrap().name, "b");
        assert!(plan.host_of_server(9).is_none());
    }
}
