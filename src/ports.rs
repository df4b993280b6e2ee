//! Port allocation from configured ranges
//!
//! Ranges come from the product's `start-end,start-end` option. Candidate
//! nodes are asked from the panel (resource fit + tags), then each node's
//! allocation pool is scanned for the first free port of every range still
//! unsatisfied. Ports may come from different nodes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{list_all, Allocation, ApiRequest, ListError, Node, PanelApi};

#[derive(Error, Debug, PartialEq)]
pub enum PortError {
    #[error("Couldn't find enough free ports: found {found} of {needed} requested.")]
    Insufficient { found: usize, needed: usize },

    #[error("Failed to {context}, received error code: {status}. Enable module debug log for more info.")]
    Panel { context: String, status: u16 },

    #[error("Failed to {context}: {message}")]
    Decode { context: String, message: String },
}

impl PortError {
    fn from_list(context: &str, err: ListError) -> Self {
        match err {
            ListError::Status(status) => Self::Panel {
                context: context.to_string(),
                status,
            },
            ListError::Decode(message) => Self::Decode {
                context: context.to_string(),
                message,
            },
        }
    }
}

/// Inclusive port interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Option<Self> {
        (start >= 1 && start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Resource fit and tag targeting for candidate nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentFilter {
    pub memory: i64,
    pub disk: i64,
    pub cpu: i64,
    pub tags: Vec<String>,
}

impl DeploymentFilter {
    fn request(&self) -> ApiRequest {
        let mut request = ApiRequest::get("nodes/deployable")
            .query("memory", self.memory.to_string())
            .query("disk", self.disk.to_string())
            .query("cpu", self.cpu.to_string());
        for tag in &self.tags {
            request = request.query("tags[]", tag.clone());
        }
        request
    }
}

/// One allocated port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortAssignment {
    pub node_id: u64,
    pub allocation_id: u64,
    pub ip: String,
    pub port: u16,
}

impl PortAssignment {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

// ============================================================================
// SBIO: Pure functions (no I/O)
// ============================================================================

/// Parse one `start-end` spec; a bare port is a single-port range
pub fn parse_port_range(spec: &str) -> Option<PortRange> {
    let spec = spec.trim();
    match spec.split_once('-') {
        Some((start, end)) => PortRange::new(start.trim().parse().ok()?, end.trim().parse().ok()?),
        None => {
            let port = spec.parse().ok()?;
            PortRange::new(port, port)
        }
    }
}

/// Parse a comma separated list of ranges, dropping malformed entries
pub fn parse_port_ranges(spec: &str) -> Vec<PortRange> {
    spec.split(',')
        .filter_map(|part| {
            let parsed = parse_port_range(part);
            if parsed.is_none() && !part.trim().is_empty() {
                debug!("Ignoring malformed port range {:?}", part);
            }
            parsed
        })
        .collect()
}

/// Tracks which ranges are satisfied and which ports are already picked
#[derive(Debug)]
pub struct AllocationPlan {
    ranges: Vec<PortRange>,
    picks: Vec<Option<PortAssignment>>,
    taken: HashSet<(u64, u16)>,
}

impl AllocationPlan {
    pub fn new(ranges: Vec<PortRange>) -> Self {
        let picks = vec![None; ranges.len()];
        Self {
            ranges,
            picks,
            taken: HashSet::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.picks.iter().all(Option::is_some)
    }

    pub fn found(&self) -> usize {
        self.picks.iter().filter(|p| p.is_some()).count()
    }

    pub fn needed(&self) -> usize {
        self.ranges.len()
    }

    /// Satisfy what this node can, ranges in the order they were specified.
    /// Returns how many ranges the node satisfied.
    pub fn fill_from_node(&mut self, node_id: u64, allocations: &[Allocation]) -> usize {
        let assigned: HashSet<u16> = allocations
            .iter()
            .filter(|a| a.assigned)
            .map(|a| a.port)
            .collect();

        // First free allocation per port
        let mut free: BTreeMap<u16, &Allocation> = BTreeMap::new();
        for allocation in allocations.iter().filter(|a| !a.assigned) {
            free.entry(allocation.port).or_insert(allocation);
        }

        let mut satisfied = 0;
        for (range, pick) in self.ranges.iter().zip(self.picks.iter_mut()) {
            if pick.is_some() {
                continue;
            }
            let found = range.ports().find_map(|port| {
                if assigned.contains(&port) || self.taken.contains(&(node_id, port)) {
                    return None;
                }
                free.get(&port).copied()
            });
            if let Some(allocation) = found {
                self.taken.insert((node_id, allocation.port));
                *pick = Some(PortAssignment {
                    node_id,
                    allocation_id: allocation.id,
                    ip: allocation.ip.clone(),
                    port: allocation.port,
                });
                satisfied += 1;
            }
        }
        satisfied
    }

    pub fn finish(self) -> Result<Vec<PortAssignment>, PortError> {
        let needed = self.needed();
        let found = self.found();
        if found < needed {
            return Err(PortError::Insufficient { found, needed });
        }
        Ok(self.picks.into_iter().flatten().collect())
    }
}

// ============================================================================
// SBIO: I/O - walk candidate nodes
// ============================================================================

/// Allocate one port per range. Results are in range order.
pub async fn allocate_ports(
    api: &dyn PanelApi,
    ranges: Vec<PortRange>,
    filter: &DeploymentFilter,
) -> Result<Vec<PortAssignment>, PortError> {
    if ranges.is_empty() {
        return Ok(Vec::new());
    }

    let nodes: Vec<Node> = list_all(api, filter.request())
        .await
        .map_err(|e| PortError::from_list("list deployable nodes", e))?;
    debug!("{} candidate nodes for {} port ranges", nodes.len(), ranges.len());

    let mut plan = AllocationPlan::new(ranges);
    for node in &nodes {
        let allocations: Vec<Allocation> =
            list_all(api, ApiRequest::get(format!("nodes/{}/allocations", node.id)))
                .await
                .map_err(|e| PortError::from_list("list node allocations", e))?;

        let satisfied = plan.fill_from_node(node.id, &allocations);
        if satisfied > 0 {
            info!(node = node.id, satisfied, "Allocated ports on node");
        }
        if plan.is_complete() {
            break;
        }
    }

    plan.finish()
}
