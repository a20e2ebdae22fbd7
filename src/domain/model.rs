use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Prefix and suffix of the systemd template unit the installer sets up.
const SERVICE_PREFIX: &str = "openvpn-server-multi@server-";
const SERVICE_SUFFIX: &str = ".service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }

    /// 選單編號：1) UDP 2) TCP
    pub fn from_menu_choice(choice: u32) -> Option<Self> {
        match choice {
            1 => Some(Protocol::Udp),
            2 => Some(Protocol::Tcp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(format!("unknown protocol '{}', expected udp or tcp", other)),
        }
    }
}

/// One OpenVPN server instance as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub network: Ipv4Addr,
}

impl Instance {
    pub fn new(name: impl Into<String>, port: u16, protocol: Protocol, network: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            port,
            protocol,
            network,
        }
    }

    /// systemd unit managing this instance, derived from the name.
    pub fn service_name(&self) -> String {
        format!("{}{}{}", SERVICE_PREFIX, self.name, SERVICE_SUFFIX)
    }

    /// Positional arguments handed to the installer script.
    pub fn installer_args(&self) -> [String; 4] {
        [
            self.name.clone(),
            self.port.to_string(),
            self.protocol.to_string(),
            self.network.to_string(),
        ]
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{name: {}, port: {}, protocol: {}, network: {}}}",
            self.name, self.port, self.protocol, self.network
        )
    }
}

/// Listing view with the derived service name, used by `list --json`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceView<'a> {
    #[serde(flatten)]
    pub instance: &'a Instance,
    pub service: String,
}

impl<'a> From<&'a Instance> for InstanceView<'a> {
    fn from(instance: &'a Instance) -> Self {
        Self {
            instance,
            service: instance.service_name(),
        }
    }
}
