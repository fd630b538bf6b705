//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, validate_config, RunSpec, ValidateArgs};

/// Format model information as a string
pub fn format_model_info(spec: &RunSpec) -> String {
    let arch = match &spec.model.config {
        Some(c) => format!(
            "custom ({} layers, {} heads, n_embd {})",
            c.n_layer, c.n_head, c.n_embd
        ),
        None => spec.model.preset.clone(),
    };
    let mut lines = vec![format!("  Model: {arch}")];
    match &spec.model.path {
        Some(path) => lines.push(format!("  Weights: {}", path.display())),
        None => lines.push("  Weights: random init".to_string()),
    }
    lines.join("\n")
}

/// Format data configuration as a string
pub fn format_data_info(spec: &RunSpec) -> String {
    let tokenizer = match (&spec.data.tokenizer, &spec.model.path) {
        (Some(path), _) => format!("GPT-2 BPE ({})", path.display()),
        (None, Some(_)) => "GPT-2 BPE (next to weights)".to_string(),
        (None, None) => "character vocabulary".to_string(),
    };
    [
        format!("  Training data: {}", spec.data.train.display()),
        format!("  Evaluation data: {}", spec.data.eval.display()),
        format!("  Tokenizer: {tokenizer}"),
        format!("  Sequence length: {}", spec.data.seq_len),
        format!("  Batch size: {}", spec.data.batch_size),
    ]
    .join("\n")
}

/// Format the substitution plan as a string
pub fn format_lowrank_info(spec: &RunSpec) -> String {
    let plan = &spec.lowrank;
    let mut lines = vec![format!("  Low-rank method: {}", plan.method)];
    for ((layer, rank), sublayer) in plan.layers.iter().zip(&plan.ranks).zip(&plan.sublayers) {
        lines.push(format!("    h.{layer}.{sublayer} -> rank {rank}"));
    }
    if let Some(alpha) = plan.lora.alpha {
        lines.push(format!("    LoRA alpha: {alpha}"));
    }
    if plan.lora.freeze_base {
        lines.push("    LoRA base: frozen".to_string());
    }
    lines.join("\n")
}

/// Format optimizer configuration as a string
pub fn format_optimizer_info(spec: &RunSpec) -> String {
    let mut lines = vec![
        format!("  Optimizer: {}", spec.optimizer.name),
        format!("  Learning rate: {}", spec.optimizer.lr),
    ];
    if spec.optimizer.momentum > 0.0 {
        lines.push(format!("  Momentum: {}", spec.optimizer.momentum));
    }
    lines.join("\n")
}

/// Format training configuration as a string
pub fn format_training_info(spec: &RunSpec) -> String {
    format!(
        "  Epochs: {}\n  Seed: {}\n  Device: {}",
        spec.training.epochs, spec.training.seed, spec.training.device
    )
}

/// Print detailed configuration summary
pub fn print_detailed_summary(spec: &RunSpec) {
    println!();
    println!("Configuration Summary:");
    println!("{}", format_model_info(spec));
    println!();
    println!("{}", format_data_info(spec));
    println!();
    println!("{}", format_lowrank_info(spec));
    println!();
    println!("{}", format_optimizer_info(spec));
    println!();
    println!("{}", format_training_info(spec));
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    validate_config(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed && level != LogLevel::Quiet {
        print_detailed_summary(&spec);
    }

    Ok(())
}
