//! Info command implementation
//!
//! Builds and patches the model without training and reports the
//! trainable-parameter change.

use serde::Serialize;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{build_model, build_plan, load_config, InfoArgs, OutputFormat, RunSpec};
use crate::nn::Module;
use crate::patch::ParamDelta;

/// Machine-readable summary of a patched model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub method: String,
    pub slots: Vec<String>,
    pub total_parameters: usize,
    pub trainable_before: usize,
    pub trainable_after: usize,
}

/// Build the model described by `spec`, patch it and collect the counts
pub fn collect_info(spec: &RunSpec) -> crate::Result<(ModelInfo, ParamDelta)> {
    let plan = build_plan(spec)?;
    let mut model = build_model(spec)?;
    let delta = plan.apply(&mut model, &spec.training.device)?;

    let info = ModelInfo {
        method: plan.method().to_string(),
        slots: plan
            .entries()
            .iter()
            .map(|e| format!("h.{}.{}:{}", e.layer, e.sublayer, e.rank))
            .collect(),
        total_parameters: model.num_parameters(),
        trainable_before: delta.before,
        trainable_after: delta.after,
    };
    Ok((info, delta))
}

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let (info, delta) = collect_info(&spec).map_err(|e| format!("Patch error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Model Info:");
            log(
                level,
                LogLevel::Normal,
                &format!("  Method: {} on {} slot(s)", info.method, info.slots.len()),
            );
            for slot in &info.slots {
                log(level, LogLevel::Verbose, &format!("    {slot}"));
            }
            log(
                level,
                LogLevel::Normal,
                &format!("  Total parameters: {}", info.total_parameters),
            );
            log(level, LogLevel::Normal, &format!("{delta}"));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&info)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&info)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
