//! CLI commands module.

mod config;
mod inspect;
mod repair;
mod util;

pub use config::ConfigCommand;
pub use inspect::InspectCommand;
pub use repair::RepairCommand;

pub(crate) use util::*;
