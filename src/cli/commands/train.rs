//! Train command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, train_from_spec, validate_config, TrainArgs};

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Rango: Training from {}", args.config.display()),
    );

    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);

    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Method: {} on {} slot(s)",
            spec.lowrank.method,
            spec.lowrank.layers.len()
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Optimizer: {} (lr={})",
            spec.optimizer.name, spec.optimizer.lr
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!("  Epochs: {}", spec.training.epochs),
    );

    if args.dry_run {
        validate_config(&spec).map_err(|e| format!("Validation failed: {e}"))?;
        log(
            level,
            LogLevel::Normal,
            "Dry run - config validated successfully",
        );
        return Ok(());
    }

    let reports = train_from_spec(&spec).map_err(|e| format!("Training error: {e}"))?;

    if let Some(last) = reports.last() {
        log(
            level,
            LogLevel::Normal,
            &format!(
                "Training complete! Final perplexity: {:.2}",
                last.perplexity
            ),
        );
    }
    Ok(())
}
