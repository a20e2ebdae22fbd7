use crate::core::allocator::{DefaultAllocator, Suggestion};
use crate::core::conflict::{find_conflicts, NetworkMatch};
use crate::core::flow::{report_conflicts, ConfigurationFlow};
use crate::core::listing::format_table;
use crate::core::registry::Registry;
use crate::domain::model::Instance;
use crate::domain::ports::{Installer, Prompter};
use crate::utils::error::{OvpnError, Result};
use crate::utils::validation::{validate_instance_name, validate_port, validate_private_network};

/// What the operator ended up doing in the main menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Created(Instance),
    Managed(Instance),
}

/// Ties the registry, allocator, prompts and installer together.
pub struct InstanceManager<P: Prompter, I: Installer> {
    registry: Registry,
    allocator: DefaultAllocator,
    network_match: NetworkMatch,
    prompter: P,
    installer: I,
}

impl<P: Prompter, I: Installer> InstanceManager<P, I> {
    pub fn new(
        registry: Registry,
        allocator: DefaultAllocator,
        network_match: NetworkMatch,
        prompter: P,
        installer: I,
    ) -> Self {
        Self {
            registry,
            allocator,
            network_match,
            prompter,
            installer,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    pub fn into_prompter(self) -> P {
        self.prompter
    }

    pub fn list(&self) -> Result<Vec<Instance>> {
        self.registry.read_all()
    }

    pub fn suggest(&self) -> Result<Suggestion> {
        let instances = self.registry.read_all()?;
        self.allocator.suggest(&instances)
    }

    /// Entry point without a subcommand.
    ///
    /// An empty registry goes straight to creating the first instance,
    /// otherwise the operator picks between managing and creating.
    pub fn run_menu(&mut self) -> Result<MenuOutcome> {
        let instances = self.registry.read_all()?;
        if instances.is_empty() {
            return self.create_interactive().map(MenuOutcome::Created);
        }

        self.prompter.say("Current instances:")?;
        self.prompter.say(&format_table(&instances))?;

        loop {
            self.prompter.say("What do you need to do?")?;
            self.prompter.say("1) Manage a instance\n2) Create a new instance")?;
            let answer = self.ask("> ")?;

            match answer.trim() {
                "1" => return self.manage_interactive(&instances).map(MenuOutcome::Managed),
                "2" => return self.create_interactive().map(MenuOutcome::Created),
                other => self
                    .prompter
                    .say(&format!("{} is not a valid answer!", other))?,
            }
        }
    }

    /// Runs the configuration flow, appends the result and hands it to the installer.
    ///
    /// The append re-validates under the registry lock; if another process
    /// claimed something in the meantime the flow is repeated with fresh data.
    pub fn create_interactive(&mut self) -> Result<Instance> {
        let instance = loop {
            let existing = self.registry.read_all()?;
            if existing.is_empty() {
                self.registry.ensure_created()?;
            }

            let candidate =
                ConfigurationFlow::new(&mut self.prompter, &self.allocator, self.network_match)
                    .run(&existing)?;

            match self.registry.append_checked(&candidate, self.network_match) {
                Ok(()) => break candidate,
                Err(OvpnError::Conflict {
                    candidate,
                    conflicts,
                }) => {
                    report_conflicts(&mut self.prompter, &candidate, &conflicts)?;
                    self.prompter
                        .say("The registry changed while you were typing, please try again.")?;
                }
                Err(e) => return Err(e),
            }
        };

        self.installer.install(&instance)?;
        Ok(instance)
    }

    /// Asks for a 1-based instance id and reruns the installer for it.
    pub fn manage_interactive(&mut self, instances: &[Instance]) -> Result<Instance> {
        let selected = loop {
            let answer = self.ask("Instance id? ")?;
            let chosen = answer
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|id| id.checked_sub(1))
                .and_then(|idx| instances.get(idx));

            match chosen {
                Some(instance) => break instance.clone(),
                None => self.prompter.say("Invalid value!")?,
            }
        };

        tracing::info!("Managing instance {}", selected.name);
        self.installer.install(&selected)?;
        Ok(selected)
    }

    /// Non-interactive create: same validation as the prompts, no retries.
    pub fn add(&mut self, name: &str, port: i64, protocol: &str, network: &str) -> Result<Instance> {
        validate_instance_name("name", name)?;
        let port = validate_port("port", port)?;
        let protocol = protocol
            .parse()
            .map_err(|reason| OvpnError::InvalidConfigValueError {
                field: "protocol".to_string(),
                value: protocol.to_string(),
                reason,
            })?;
        let network = validate_private_network("network", network.trim())?;
        let candidate = Instance::new(name, port, protocol, network);

        let existing = self.registry.read_all()?;
        let conflicts = find_conflicts(&candidate, &existing, self.network_match);
        if !conflicts.is_empty() {
            return Err(OvpnError::Conflict {
                candidate,
                conflicts,
            });
        }

        self.registry
            .append_checked(&candidate, self.network_match)?;
        self.installer.install(&candidate)?;
        Ok(candidate)
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.prompter.ask(prompt)?.ok_or(OvpnError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Console;
    use crate::domain::model::Protocol;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingInstaller {
        calls: RefCell<Vec<Instance>>,
    }

    impl Installer for RecordingInstaller {
        fn install(&self, instance: &Instance) -> Result<()> {
            self.calls.borrow_mut().push(instance.clone());
            Ok(())
        }
    }

    fn manager(
        dir: &std::path::Path,
        script: &str,
    ) -> InstanceManager<Console<Cursor<String>, Vec<u8>>, RecordingInstaller> {
        InstanceManager::new(
            Registry::new(dir.join("instances")),
            DefaultAllocator::default(),
            NetworkMatch::Exact,
            Console::new(Cursor::new(script.to_string()), Vec::new()),
            RecordingInstaller::default(),
        )
    }

    #[test]
    fn test_menu_on_empty_registry_creates() {
        let dir = tempdir().unwrap();
        let mut manager = manager(dir.path(), "\n\n\n\n");

        let outcome = manager.run_menu().unwrap();
        let expected = Instance::new("inst0", 1194, Protocol::Udp, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(outcome, MenuOutcome::Created(expected.clone()));
        assert_eq!(manager.list().unwrap(), vec![expected.clone()]);
        assert_eq!(*manager.installer().calls.borrow(), vec![expected]);
    }

    #[test]
    fn test_menu_manage_selects_by_id() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("instances"));
        let first = Instance::new("inst0", 1194, Protocol::Udp, Ipv4Addr::new(10, 0, 0, 0));
        let second = Instance::new("inst1", 1195, Protocol::Tcp, Ipv4Addr::new(10, 0, 1, 0));
        registry.append(&first).unwrap();
        registry.append(&second).unwrap();

        let mut manager = manager(dir.path(), "9\n1\n0\nx\n2\n");
        let outcome = manager.run_menu().unwrap();
        assert_eq!(outcome, MenuOutcome::Managed(second.clone()));
        assert_eq!(*manager.installer().calls.borrow(), vec![second]);
        // 管理既有實例不會寫入 registry
        assert_eq!(manager.list().unwrap().len(), 2);

        let output = String::from_utf8(manager.into_prompter().into_output()).unwrap();
        assert!(output.contains("9 is not a valid answer!"));
        assert_eq!(output.matches("Invalid value!").count(), 2);
    }

    #[test]
    fn test_menu_cancel_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut manager = manager(dir.path(), "inst0\n");
        assert!(matches!(manager.run_menu(), Err(OvpnError::Cancelled)));
        assert!(manager.list().unwrap().is_empty());
        assert!(manager.installer().calls.borrow().is_empty());
    }

    #[test]
    fn test_add_rejects_conflict_and_bad_input() {
        let dir = tempdir().unwrap();
        let mut manager = manager(dir.path(), "");

        manager.add("inst0", 1194, "udp", "10.0.0.0").unwrap();
        assert!(matches!(
            manager.add("inst1", 1194, "udp", "10.0.1.0"),
            Err(OvpnError::Conflict { .. })
        ));
        assert!(manager.add("inst1", 1194, "icmp", "10.0.1.0").is_err());
        assert!(manager.add("inst1", 0, "udp", "10.0.1.0").is_err());
        assert!(manager.add("inst1", 1195, "udp", "127.0.1.0").is_err());

        manager.add("inst1", 1194, "tcp", "10.0.1.0").unwrap();
        assert_eq!(manager.list().unwrap().len(), 2);
        assert_eq!(manager.installer().calls.borrow().len(), 2);
    }
}
