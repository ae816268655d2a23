//! Template inspection command.

use std::path::PathBuf;

use clap::Args;
use fpid_template::{RepairPipeline, has_png_signature, png_dimensions};
use serde::Serialize;

use super::{TemplateInput, output_result};
use crate::Cli;

/// Reports what the record store and the engine would make of a template.
#[derive(Args)]
pub struct InspectCommand {
    /// Template file (base64 text or PNG)
    input: PathBuf,
}

#[derive(Serialize)]
struct InspectReport {
    input: String,
    decoded_len: usize,
    png_signature: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    /// Record-store verdict, before any repair.
    corrupt: bool,
    /// Whether the repair pipeline produced decodable bytes.
    repairable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    repair_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repair_error: Option<String>,
}

impl InspectCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let template = TemplateInput::read(&self.input)?;
        let report = inspect(&template, self.input.display().to_string());
        output_result(&report, cli.output.as_deref(), cli.json)
    }
}

fn inspect(template: &TemplateInput, input: String) -> InspectReport {
    let corrupt = template.is_corrupt();
    let raw = match template.decode() {
        Ok(raw) => raw,
        Err(e) => {
            return InspectReport {
                input,
                decoded_len: 0,
                png_signature: false,
                width: None,
                height: None,
                corrupt,
                repairable: false,
                repair_strategy: None,
                repair_error: Some(e.to_string()),
            };
        }
    };

    let dims = png_dimensions(&raw);
    let (repair_strategy, repair_error) = match RepairPipeline::new().repair(&raw) {
        Ok(r) => (Some(r.strategy.to_string()), None),
        Err(e) => (None, Some(e.to_string())),
    };

    InspectReport {
        input,
        decoded_len: raw.len(),
        png_signature: has_png_signature(&raw),
        width: dims.map(|(w, _)| w),
        height: dims.map(|(_, h)| h),
        corrupt,
        repairable: repair_strategy.is_some(),
        repair_strategy,
        repair_error,
    }
}
