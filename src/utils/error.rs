use crate::core::conflict::Conflict;
use crate::domain::model::Instance;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OvpnError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Malformed registry line {line} ('{content}'): {reason}")]
    MalformedRegistryLine {
        line: usize,
        content: String,
        reason: String,
    },

    #[error("Instance {candidate} overlaps with {} existing instance(s)", .conflicts.len())]
    Conflict {
        candidate: Instance,
        conflicts: Vec<Conflict>,
    },

    #[error("No free {field} left to suggest")]
    Exhausted { field: String },

    #[error("Installer failed: {message}")]
    InstallerFailed { message: String },

    #[error("Registry lock error: {message}")]
    LockError { message: String },

    #[error("This tool must be run as root")]
    NotRoot,

    #[error("Cancelled by user")]
    Cancelled,
}

impl OvpnError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            OvpnError::NotRoot => "Run this as root!".to_string(),
            OvpnError::Cancelled => "Cancelled, nothing was written.".to_string(),
            OvpnError::MalformedRegistryLine { line, .. } => {
                format!("The instance registry is corrupted at line {}", line)
            }
            OvpnError::Conflict { candidate, .. } => {
                format!("{} overlaps an existing instance", candidate)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            OvpnError::IoError(_) => "Check that the registry directory exists and is writable",
            OvpnError::SerializationError(_) => "Report this as a bug",
            OvpnError::ConfigError { .. }
            | OvpnError::ConfigValidationError { .. }
            | OvpnError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command line arguments"
            }
            OvpnError::MalformedRegistryLine { .. } => {
                "Each entry must look like name;port;protocol;network"
            }
            OvpnError::Conflict { .. } => "Pick a different name, network or port/protocol",
            OvpnError::Exhausted { .. } => "Enter a value explicitly instead of the default",
            OvpnError::InstallerFailed { .. } => {
                "The registry entry was written; rerun the installer through 'Manage a instance'"
            }
            OvpnError::LockError { .. } => "Another ovpn-instances process may be running",
            OvpnError::NotRoot => "Use sudo or log in as root",
            OvpnError::Cancelled => "Run the command again when ready",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            OvpnError::Cancelled => 130,
            OvpnError::InstallerFailed { .. } => 2,
            OvpnError::Conflict { .. } => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, OvpnError>;
