use crate::domain::model::Instance;
use crate::utils::error::Result;

/// Line-oriented interaction with the operator.
pub trait Prompter {
    /// Prints `prompt` without a newline and reads one line.
    /// `Ok(None)` means the input was closed, which callers treat as a cancel.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>>;

    fn say(&mut self, message: &str) -> Result<()>;
}

/// The external collaborator that actually sets up an OpenVPN server.
pub trait Installer {
    fn install(&self, instance: &Instance) -> Result<()>;
}
