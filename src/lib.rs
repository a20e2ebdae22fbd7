pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{Console, ScriptInstaller};
pub use config::AppConfig;
pub use crate::core::{
    allocator::DefaultAllocator, conflict::NetworkMatch, manager::InstanceManager,
    registry::Registry,
};
pub use domain::model::{Instance, Protocol};
pub use utils::error::{OvpnError, Result};
