use crate::config::toml_config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::core::conflict::NetworkMatch;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "ovpn-instances")]
#[command(about = "Create and manage multiple OpenVPN server instances on one host")]
pub struct CliConfig {
    /// TOML configuration file (default: /etc/openvpn/ovpn-instances.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the instance registry path
    #[arg(long)]
    pub registry: Option<String>,

    /// Override the installer script
    #[arg(long)]
    pub installer: Option<String>,

    /// Treat networks in the same /24 as conflicting, not only identical addresses
    #[arg(long)]
    pub subnet_check: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// For development against a non-privileged registry
    #[arg(long, hide = true)]
    pub skip_root_check: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Interactive menu (the default)
    Menu,
    /// Configure and install a new instance interactively
    Create,
    /// Print the registered instances
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print the next free name, port and network
    Suggest,
    /// Register and install an instance without prompting
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        port: i64,
        #[arg(long, default_value = "udp")]
        protocol: String,
        #[arg(long)]
        network: String,
    },
}

impl CliConfig {
    /// File configuration with command line overrides applied on top.
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path, true)?,
            None => AppConfig::load(DEFAULT_CONFIG_PATH, false)?,
        };

        if let Some(registry) = &self.registry {
            config.registry.path = registry.clone();
        }
        if let Some(installer) = &self.installer {
            config.installer.script = installer.clone();
        }
        if self.subnet_check {
            config.validation.network_match = NetworkMatch::Subnet24;
        }

        Ok(config)
    }
}
