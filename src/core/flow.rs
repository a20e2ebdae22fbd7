use crate::core::allocator::DefaultAllocator;
use crate::core::conflict::{find_conflicts, Conflict, NetworkMatch};
use crate::core::listing::format_table;
use crate::domain::model::{Instance, Protocol};
use crate::domain::ports::Prompter;
use crate::utils::error::{OvpnError, Result};
use crate::utils::validation::{validate_instance_name, validate_ipv4, validate_port, validate_private_network};
use std::net::Ipv4Addr;

const INVALID_VALUE: &str = "Invalid value!";

/// Interactive construction of a new instance.
///
/// Fields are asked in a fixed order (name, protocol, port, network), each with
/// its own retry loop. The finished candidate is then checked against every
/// existing instance; on any overlap the whole sequence starts over.
pub struct ConfigurationFlow<'a, P: Prompter> {
    prompter: &'a mut P,
    allocator: &'a DefaultAllocator,
    network_match: NetworkMatch,
}

impl<'a, P: Prompter> ConfigurationFlow<'a, P> {
    pub fn new(
        prompter: &'a mut P,
        allocator: &'a DefaultAllocator,
        network_match: NetworkMatch,
    ) -> Self {
        Self {
            prompter,
            allocator,
            network_match,
        }
    }

    pub fn run(&mut self, existing: &[Instance]) -> Result<Instance> {
        if !existing.is_empty() {
            self.prompter.say("These are the current instances: ")?;
            self.prompter.say(&format_table(existing))?;
            self.prompter.say("Do not overlap configurations!")?;
        }

        loop {
            let name = self.ask_name(existing)?;
            let protocol = self.ask_protocol()?;
            let port = self.ask_port(existing)?;
            let network = self.ask_network(existing)?;

            let candidate = Instance::new(name, port, protocol, network);
            let conflicts = find_conflicts(&candidate, existing, self.network_match);
            if conflicts.is_empty() {
                tracing::debug!("Accepted candidate {}", candidate);
                return Ok(candidate);
            }

            tracing::debug!(
                "Candidate {} rejected with {} conflict(s)",
                candidate,
                conflicts.len()
            );
            report_conflicts(self.prompter, &candidate, &conflicts)?;
        }
    }

    fn prompt(&mut self, prompt: &str) -> Result<String> {
        match self.prompter.ask(prompt)? {
            Some(answer) => Ok(answer.trim().to_string()),
            None => Err(OvpnError::Cancelled),
        }
    }

    fn ask_name(&mut self, existing: &[Instance]) -> Result<String> {
        let default = self.allocator.name(existing);
        loop {
            let answer = self.prompt(&format!("Enter a instance name to use [{}]: ", default))?;
            let name = if answer.is_empty() { default.clone() } else { answer };

            match validate_instance_name("name", &name) {
                Ok(()) => return Ok(name),
                Err(_) => self
                    .prompter
                    .say(&format!("{} is not a valid instance name", name))?,
            }
        }
    }

    fn ask_protocol(&mut self) -> Result<Protocol> {
        loop {
            self.prompter.say("Which protocol should OpenVPN use?")?;
            self.prompter.say("\t1) UDP (recommended)")?;
            self.prompter.say("\t2) TCP")?;

            let answer = self.prompt("Protocol [1]: ")?;
            let choice = if answer.is_empty() { "1" } else { answer.as_str() };

            match choice.parse::<u32>().ok().and_then(Protocol::from_menu_choice) {
                Some(protocol) => return Ok(protocol),
                None => self.prompter.say(INVALID_VALUE)?,
            }
        }
    }

    fn ask_port(&mut self, existing: &[Instance]) -> Result<u16> {
        let default = match self.allocator.port(existing) {
            Ok(port) => Some(port),
            Err(e) => {
                tracing::warn!("No default port available: {}", e);
                None
            }
        };

        loop {
            self.prompter.say("Which port should OpenVPN use?")?;
            let answer = match default {
                Some(port) => self.prompt(&format!("Port [{}]: ", port))?,
                None => self.prompt("Port: ")?,
            };

            let value = if answer.is_empty() {
                default.map(i64::from)
            } else {
                answer.parse::<i64>().ok()
            };

            let Some(value) = value else {
                self.prompter.say(INVALID_VALUE)?;
                continue;
            };

            match validate_port("port", value) {
                Ok(port) => return Ok(port),
                Err(_) => self
                    .prompter
                    .say(&format!("{} is not a valid port", value))?,
            }
        }
    }

    fn ask_network(&mut self, existing: &[Instance]) -> Result<Ipv4Addr> {
        let default = match self.allocator.network(existing) {
            Ok(network) => Some(network),
            Err(e) => {
                tracing::warn!("No default network available: {}", e);
                None
            }
        };

        loop {
            self.prompter
                .say("Which internal network should OpenVPN use?")?;
            let answer = match default {
                Some(network) => self.prompt(&format!(
                    "Enter a network, /24 netmask will be used [{}]: ",
                    network
                ))?,
                None => self.prompt("Enter a network, /24 netmask will be used: ")?,
            };

            let network = match (answer.is_empty(), default) {
                (true, Some(network)) => network.to_string(),
                _ => answer,
            };

            if validate_ipv4("network", &network).is_err() {
                self.prompter
                    .say(&format!("{} is not a valid IPv4 address", network))?;
                continue;
            }

            match validate_private_network("network", &network) {
                Ok(addr) => return Ok(addr),
                Err(_) => self.prompter.say(&format!(
                    "{} is not a private IPv4 /24 network address",
                    network
                ))?,
            }
        }
    }
}

pub fn report_conflicts<P: Prompter + ?Sized>(
    prompter: &mut P,
    candidate: &Instance,
    conflicts: &[Conflict],
) -> Result<()> {
    for conflict in conflicts {
        prompter.say(&format!(
            "{}\nis not a valid configuration, overlaps with ({}): \n{}",
            candidate, conflict.kind, conflict.existing
        ))?;
    }
    Ok(())
}
