pub mod allocator;
pub mod conflict;
pub mod flow;
pub mod listing;
pub mod manager;
pub mod registry;

pub use crate::domain::model::{Instance, Protocol};
pub use crate::domain::ports::{Installer, Prompter};
pub use crate::utils::error::Result;
