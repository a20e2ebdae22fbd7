//! Suggested defaults for a new instance.
//!
//! Each suggestion starts from a base value and steps forward until it no
//! longer matches an existing instance. The result is only advisory: whatever
//! the operator finally enters still goes through the conflict check.

use crate::domain::model::Instance;
use crate::utils::error::{OvpnError, Result};
use crate::utils::validation::{is_private_network, MAX_PORT};
use std::net::Ipv4Addr;

pub const DEFAULT_NAME: &str = "inst0";
pub const DEFAULT_PORT: u16 = 1194;
pub const DEFAULT_NETWORK: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);

/// Third octet at which the network suggestion rolls over into the second octet.
const THIRD_OCTET_ROLLOVER: u8 = 254;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorDefaults {
    pub name: String,
    pub port: u16,
    pub network: Ipv4Addr,
}

impl Default for AllocatorDefaults {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            port: DEFAULT_PORT,
            network: DEFAULT_NETWORK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub name: String,
    pub port: u16,
    pub network: Ipv4Addr,
}

#[derive(Debug, Clone, Default)]
pub struct DefaultAllocator {
    defaults: AllocatorDefaults,
}

impl DefaultAllocator {
    pub fn new(defaults: AllocatorDefaults) -> Self {
        Self { defaults }
    }

    pub fn name(&self, instances: &[Instance]) -> String {
        let mut name = self.defaults.name.clone();
        while instances.iter().any(|i| i.name == name) {
            name = next_name(&name);
        }
        tracing::debug!("Suggested name: {}", name);
        name
    }

    pub fn port(&self, instances: &[Instance]) -> Result<u16> {
        let mut port = self.defaults.port;
        while instances.iter().any(|i| i.port == port) {
            if port >= MAX_PORT {
                return Err(OvpnError::Exhausted {
                    field: "port".to_string(),
                });
            }
            port += 1;
        }
        tracing::debug!("Suggested port: {}", port);
        Ok(port)
    }

    pub fn network(&self, instances: &[Instance]) -> Result<Ipv4Addr> {
        let mut network = self.defaults.network;
        while instances.iter().any(|i| i.network == network) {
            network = next_network(network)
                .filter(|next| is_private_network(*next))
                .ok_or_else(|| OvpnError::Exhausted {
                    field: "network".to_string(),
                })?;
        }
        tracing::debug!("Suggested network: {}", network);
        Ok(network)
    }

    pub fn suggest(&self, instances: &[Instance]) -> Result<Suggestion> {
        Ok(Suggestion {
            name: self.name(instances),
            port: self.port(instances)?,
            network: self.network(instances)?,
        })
    }
}

/// `inst0` -> `inst1`, `inst9` -> `inst10`, `vpn` -> `vpn1`.
fn next_name(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &name[stem.len()..];
    if digits.is_empty() {
        return format!("{}1", name);
    }

    // 保留前導零的寬度，例如 inst09 -> inst10
    let width = digits.len();
    match digits.parse::<u128>().ok().and_then(|n| n.checked_add(1)) {
        Some(n) => format!("{}{:0width$}", stem, n, width = width),
        None => format!("{}1", name),
    }
}

/// Steps the third octet; `a.b.254.d` (or above) rolls over to `a.(b+1).0.d`.
fn next_network(network: Ipv4Addr) -> Option<Ipv4Addr> {
    let [a, b, c, d] = network.octets();
    if c < THIRD_OCTET_ROLLOVER {
        Some(Ipv4Addr::new(a, b, c + 1, d))
    } else {
        Some(Ipv4Addr::new(a, b.checked_add(1)?, 0, d))
    }
}
