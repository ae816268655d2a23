//! Template repair command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use fpid_template::{RepairPipeline, Strategy};
use serde::Serialize;

use super::{output_result, read_template};
use crate::Cli;

/// Runs the repair pipeline on one template.
///
/// With `-o`, the repaired PNG is written there; the report always goes
/// to stdout.
#[derive(Args)]
pub struct RepairCommand {
    /// Template file (base64 text or PNG)
    input: PathBuf,

    /// Only try these strategies, in order
    #[arg(long, value_delimiter = ',', value_parser = parse_strategy)]
    strategies: Vec<Strategy>,

    /// Directory for the file round-trip strategy
    #[arg(long)]
    temp_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct RepairReport {
    input: String,
    strategy: String,
    bytes_in: usize,
    bytes_out: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    written: Option<String>,
}

impl RepairCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let raw = read_template(&self.input)?;

        let mut pipeline = if self.strategies.is_empty() {
            RepairPipeline::new()
        } else {
            RepairPipeline::with_strategies(&self.strategies)
        };
        if let Some(dir) = &self.temp_dir {
            pipeline = pipeline.with_temp_dir(dir);
        }

        let repaired = pipeline
            .repair(&raw)
            .with_context(|| format!("repair {}", self.input.display()))?;
        tracing::debug!(strategy = %repaired.strategy, "template repaired");

        if let Some(path) = &cli.output {
            std::fs::write(path, &repaired.bytes).with_context(|| format!("write {path}"))?;
        }

        let report = RepairReport {
            input: self.input.display().to_string(),
            strategy: repaired.strategy.to_string(),
            bytes_in: raw.len(),
            bytes_out: repaired.bytes.len(),
            written: cli.output.clone(),
        };
        output_result(&report, None, cli.json)
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    Strategy::ALL
        .into_iter()
        .find(|st| st.as_str() == s.trim())
        .ok_or_else(|| {
            let names: Vec<_> = Strategy::ALL.iter().map(|st| st.as_str()).collect();
            format!("unknown strategy {s:?}, expected one of {}", names.join(", "))
        })
}
