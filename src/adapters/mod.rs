// Adapters layer: concrete implementations of the domain ports (terminal, installer script).

pub mod console;
pub mod installer;

pub use console::Console;
pub use installer::ScriptInstaller;
