use crate::domain::model::Instance;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// How two networks are compared when looking for overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMatch {
    /// Same address only. `10.0.5.1` and `10.0.5.0` do not conflict.
    #[default]
    Exact,
    /// Same /24 block.
    Subnet24,
}

impl NetworkMatch {
    pub fn overlaps(&self, a: Ipv4Addr, b: Ipv4Addr) -> bool {
        match self {
            NetworkMatch::Exact => a == b,
            NetworkMatch::Subnet24 => a.octets()[..3] == b.octets()[..3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Name,
    Network,
    PortProtocol,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Name => f.write_str("name"),
            ConflictKind::Network => f.write_str("network"),
            ConflictKind::PortProtocol => f.write_str("port/protocol"),
        }
    }
}

/// An existing instance the candidate collides with, and on what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub existing: Instance,
}

/// First violated rule between two instances, checked as name, network, port/protocol.
pub fn conflict_between(
    candidate: &Instance,
    existing: &Instance,
    network_match: NetworkMatch,
) -> Option<ConflictKind> {
    if candidate.name == existing.name {
        Some(ConflictKind::Name)
    } else if network_match.overlaps(candidate.network, existing.network) {
        Some(ConflictKind::Network)
    } else if candidate.port == existing.port && candidate.protocol == existing.protocol {
        Some(ConflictKind::PortProtocol)
    } else {
        None
    }
}

/// Every existing instance the candidate overlaps, in registry order.
pub fn find_conflicts(
    candidate: &Instance,
    existing: &[Instance],
    network_match: NetworkMatch,
) -> Vec<Conflict> {
    existing
        .iter()
        .filter_map(|other| {
            conflict_between(candidate, other, network_match).map(|kind| Conflict {
                kind,
                existing: other.clone(),
            })
        })
        .collect()
}

pub fn is_acceptable(candidate: &Instance, existing: &[Instance]) -> bool {
    find_conflicts(candidate, existing, NetworkMatch::Exact).is_empty()
}
