//! Declarative configuration
//!
//! A YAML [`RunSpec`] describes the base model, the text corpora, the
//! substitution plan, the optimizer and the training schedule.
//! [`validate_config`] checks it up front and [`train_from_yaml`] runs it end
//! to end. The [`Cli`] types drive the `rango` binary.

mod cli;
mod loader;
mod schema;
mod validate;

pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, TrainArgs, ValidateArgs,
};
pub use loader::{
    build_model, build_optimizer, build_plan, build_tokenizer, load_config, load_corpus,
    train_from_spec, train_from_yaml, Corpus,
};
pub use schema::{
    DataSpec, LoraOptions, LowRankSpec, ModelSpec, OptimSpec, RunSpec, TrainingParams,
};
pub use validate::{validate_config, ValidationError};
