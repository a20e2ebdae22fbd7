use crate::adapters::installer::{ScriptInstaller, DEFAULT_SCRIPT, DEFAULT_SHELL};
use crate::core::allocator::{AllocatorDefaults, DEFAULT_NAME, DEFAULT_NETWORK, DEFAULT_PORT};
use crate::core::conflict::NetworkMatch;
use crate::core::registry::{Registry, DEFAULT_REGISTRY_PATH};
use crate::utils::error::{OvpnError, Result};
use crate::utils::validation::{
    validate_instance_name, validate_path, validate_port, validate_private_network, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/openvpn/ovpn-instances.toml";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub registry: RegistryConfig,
    pub installer: InstallerConfig,
    pub defaults: DefaultsConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_REGISTRY_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub shell: String,
    pub script: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            script: DEFAULT_SCRIPT.to_string(),
        }
    }
}

/// Base values the allocator starts counting from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub name: String,
    pub port: i64,
    pub network: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            port: i64::from(DEFAULT_PORT),
            network: DEFAULT_NETWORK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub network_match: NetworkMatch,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` if it exists. With `required` a missing file is an error,
    /// otherwise built-in defaults are used.
    pub fn load<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        let path = path.as_ref();
        if !required && !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        tracing::debug!("Loading config from {}", path.display());
        Self::from_file(path).map_err(|e| OvpnError::ConfigError {
            message: format!("cannot load {}: {}", path.display(), e),
        })
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| OvpnError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENVPN_DIR})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn registry(&self) -> Registry {
        Registry::new(&self.registry.path)
    }

    pub fn installer(&self) -> ScriptInstaller {
        ScriptInstaller::new(&self.installer.shell, &self.installer.script)
    }

    pub fn allocator_defaults(&self) -> Result<AllocatorDefaults> {
        validate_instance_name("defaults.name", &self.defaults.name)?;
        Ok(AllocatorDefaults {
            name: self.defaults.name.clone(),
            port: validate_port("defaults.port", self.defaults.port)?,
            network: validate_private_network("defaults.network", &self.defaults.network)?,
        })
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_path("registry.path", &self.registry.path)?;
        validate_path("installer.shell", &self.installer.shell)?;
        validate_path("installer.script", &self.installer.script)?;
        self.allocator_defaults()?;
        Ok(())
    }
}
