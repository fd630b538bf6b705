//! Rango CLI
//!
//! # Usage
//!
//! ```bash
//! # Patch and fine-tune from config
//! rango train finetune.yaml
//!
//! # Train with overrides
//! rango train finetune.yaml --epochs 10 --lr 0.001 --method lora
//!
//! # Validate config
//! rango validate finetune.yaml --detailed
//!
//! # Patch only and report the trainable-parameter change
//! rango info finetune.yaml --format json
//! ```

use clap::Parser;
use rango::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
