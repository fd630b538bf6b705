//! YAML schema for low-rank fine-tuning runs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::device::ComputeDevice;
use crate::error::Result;
use crate::lowrank::LowRankMethod;
use crate::transformer::{GptConfig, Sublayer};

/// Complete run specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Base model
    #[serde(default)]
    pub model: ModelSpec,

    /// Text corpora and batching
    pub data: DataSpec,

    /// Which projections to substitute, and how
    pub lowrank: LowRankSpec,

    /// Optimizer configuration
    #[serde(default)]
    pub optimizer: OptimSpec,

    /// Training hyperparameters
    #[serde(default)]
    pub training: TrainingParams,
}

/// Base model: a preset or explicit dimensions, optionally with pretrained weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Preset name: "gpt2" | "gpt2-medium" | "distilgpt2" | "tiny"
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Explicit dimensions, taking precedence over `preset`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GptConfig>,

    /// SafeTensors file or directory; random initialization when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ModelSpec {
    /// Resolve the architecture
    pub fn gpt_config(&self) -> Result<GptConfig> {
        match &self.config {
            Some(config) => Ok(config.clone()),
            None => GptConfig::preset(&self.preset),
        }
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            config: None,
            path: None,
        }
    }
}

fn default_preset() -> String {
    "gpt2".to_string()
}

/// Data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    /// Training text file
    pub train: PathBuf,

    /// Held-out text file for perplexity
    pub eval: PathBuf,

    /// Tokens per sequence
    #[serde(default = "default_seq_len")]
    pub seq_len: usize,

    /// Sequences per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Lowercase text before tokenizing
    #[serde(default)]
    pub lowercase: bool,

    /// GPT-2 tokenizer: a `tokenizer.json` file or a directory holding it (or
    /// `vocab.json` with `merges.txt`). Defaults to the weights' directory when
    /// `model.path` is set; a character vocabulary is fitted otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<PathBuf>,
}

fn default_seq_len() -> usize {
    64
}

fn default_batch_size() -> usize {
    8
}

/// Substitution plan as parallel lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowRankSpec {
    /// "svd" | "lora"
    pub method: LowRankMethod,

    /// Block indices
    pub layers: Vec<usize>,

    /// Target rank per entry
    pub ranks: Vec<usize>,

    /// Sublayer tag per entry (attn_c_attn, attn_c_proj, mlp_c_fc, mlp_c_proj)
    pub sublayers: Vec<Sublayer>,

    /// LoRA-only options
    #[serde(default)]
    pub lora: LoraOptions,
}

/// LoRA options shared by every adapted slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraOptions {
    /// Scaling numerator; defaults to the rank (scale 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,

    /// Stop training the wrapped weight and bias
    pub freeze_base: bool,

    /// Standard deviation of the factor initialization
    pub init_std: f32,
}

impl Default for LoraOptions {
    fn default() -> Self {
        Self {
            alpha: None,
            freeze_base: false,
            init_std: 1.0,
        }
    }
}

/// Optimizer specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimSpec {
    /// Optimizer name: "adam" | "sgd"
    pub name: String,

    /// Learning rate
    pub lr: f32,

    /// SGD momentum
    pub momentum: f32,
}

impl Default for OptimSpec {
    fn default() -> Self {
        Self {
            name: "adam".to_string(),
            lr: 1e-5,
            momentum: 0.0,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Number of epochs
    pub epochs: usize,

    /// Seed for initialization, LoRA factors and dropout
    pub seed: u64,

    /// Target device ("cpu", "cuda:0")
    pub device: ComputeDevice,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 3,
            seed: 42,
            device: ComputeDevice::Cpu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
data:
  train: train.txt
  eval: eval.txt

lowrank:
  method: svd
  layers: [0, 1]
  ranks: [8, 8]
  sublayers: [attn_c_proj, mlp_c_fc]
";

    #[test]
    fn test_deserialize_minimal_config() {
        let spec: RunSpec = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(spec.model.preset, "gpt2");
        assert_eq!(spec.data.seq_len, 64);
        assert_eq!(spec.data.batch_size, 8);
        assert_eq!(spec.lowrank.method, LowRankMethod::Svd);
        assert_eq!(spec.lowrank.sublayers, vec![Sublayer::AttnCProj, Sublayer::MlpCFc]);
        assert_eq!(spec.optimizer.name, "adam");
        assert_eq!(spec.training.epochs, 3);
        assert_eq!(spec.training.device, ComputeDevice::Cpu);
        assert_eq!(spec.lowrank.lora.init_std, 1.0);
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r"
model:
  preset: tiny
  path: ./weights
data:
  train: a.txt
  eval: b.txt
  seq_len: 16
  batch_size: 2
  lowercase: true
  tokenizer: ./weights/tokenizer.json
lowrank:
  method: lora
  layers: [1]
  ranks: [4]
  sublayers: [attn_c_attn]
  lora:
    alpha: 8.0
    freeze_base: true
optimizer:
  name: sgd
  lr: 0.01
  momentum: 0.9
training:
  epochs: 5
  seed: 7
  device: cuda:1
";
        let spec: RunSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.model.path, Some(PathBuf::from("./weights")));
        assert_eq!(spec.data.tokenizer, Some(PathBuf::from("./weights/tokenizer.json")));
        assert_eq!(spec.lowrank.lora.alpha, Some(8.0));
        assert!(spec.lowrank.lora.freeze_base);
        assert_eq!(spec.optimizer.momentum, 0.9);
        assert_eq!(spec.training.device, ComputeDevice::Cuda { device_id: 1 });
        assert_eq!(spec.model.gpt_config().unwrap(), GptConfig::tiny());
    }

    #[test]
    fn test_explicit_dimensions_override_preset() {
        let yaml = r"
preset: gpt2
config:
  vocab_size: 64
  n_positions: 32
  n_embd: 8
  n_head: 2
  n_layer: 1
";
        let model: ModelSpec = serde_yaml::from_str(yaml).unwrap();
        let config = model.gpt_config().unwrap();
        assert_eq!(config.vocab_size, 64);
        assert_eq!(config.layer_norm_epsilon, 1e-5);
    }

    #[test]
    fn test_rejects_unknown_tags() {
        let bad_method = MINIMAL.replace("method: svd", "method: qr");
        assert!(serde_yaml::from_str::<RunSpec>(&bad_method).is_err());
        let bad_sublayer = MINIMAL.replace("mlp_c_fc]", "mlp_gate]");
        assert!(serde_yaml::from_str::<RunSpec>(&bad_sublayer).is_err());
    }
}
