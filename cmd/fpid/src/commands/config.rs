//! Engine configuration command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use fpid_identify::EngineConfig;

use super::output_result;
use crate::Cli;

/// Loads (or defaults) and validates an engine configuration, then prints
/// the effective values.
#[derive(Args)]
pub struct ConfigCommand {
    /// Config file (YAML or JSON); defaults are printed when omitted
    path: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = match &self.path {
            Some(path) => {
                EngineConfig::load(path).with_context(|| format!("load {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        output_result(&cfg, cli.output.as_deref(), cli.json)
    }
}
