use crate::domain::model::Instance;
use crate::domain::ports::Installer;
use crate::utils::error::{OvpnError, Result};
use std::path::PathBuf;
use std::process::Command;

pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_SCRIPT: &str = ".openvpn-install-multi.sh";

/// Runs `<shell> <script> <name> <port> <protocol> <network>` with inherited stdio,
/// the script prompts the operator on its own.
#[derive(Debug, Clone)]
pub struct ScriptInstaller {
    shell: PathBuf,
    script: PathBuf,
}

impl ScriptInstaller {
    pub fn new(shell: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            script: script.into(),
        }
    }

    fn command(&self, instance: &Instance) -> Command {
        let mut command = Command::new(&self.shell);
        command.arg(&self.script).args(instance.installer_args());
        command
    }
}

impl Default for ScriptInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL, DEFAULT_SCRIPT)
    }
}

impl Installer for ScriptInstaller {
    fn install(&self, instance: &Instance) -> Result<()> {
        tracing::info!(
            "Running {} {} for {}",
            self.shell.display(),
            self.script.display(),
            instance
        );

        let status = self
            .command(instance)
            .status()
            .map_err(|e| OvpnError::InstallerFailed {
                message: format!(
                    "could not start {} {}: {}",
                    self.shell.display(),
                    self.script.display(),
                    e
                ),
            })?;

        if !status.success() {
            tracing::error!("Installer for {} exited with {}", instance.name, status);
            return Err(OvpnError::InstallerFailed {
                message: format!("{} exited with {}", self.script.display(), status),
            });
        }

        tracing::info!("Installer for {} finished", instance.name);
        Ok(())
    }
}
