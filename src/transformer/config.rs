//! GPT-2 model configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for GPT-2 style decoder models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GptConfig {
    /// Vocabulary size
    pub vocab_size: usize,
    /// Maximum sequence length (learned position embeddings)
    pub n_positions: usize,
    /// Hidden dimension
    pub n_embd: usize,
    /// Number of attention heads
    pub n_head: usize,
    /// Number of transformer blocks
    pub n_layer: usize,
    /// LayerNorm epsilon
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f32,
    /// Dropout on embeddings and residual branches in training mode
    #[serde(default)]
    pub dropout: f32,
    /// Standard deviation for random initialization
    #[serde(default = "default_init_std")]
    pub initializer_range: f32,
}

fn default_layer_norm_epsilon() -> f32 {
    1e-5
}

fn default_init_std() -> f32 {
    0.02
}

impl GptConfig {
    /// GPT-2 small (124M)
    pub fn gpt2() -> Self {
        Self {
            vocab_size: 50257,
            n_positions: 1024,
            n_embd: 768,
            n_head: 12,
            n_layer: 12,
            layer_norm_epsilon: 1e-5,
            dropout: 0.1,
            initializer_range: 0.02,
        }
    }

    /// GPT-2 medium (355M)
    pub fn gpt2_medium() -> Self {
        Self {
            n_embd: 1024,
            n_head: 16,
            n_layer: 24,
            ..Self::gpt2()
        }
    }

    /// DistilGPT-2 (82M)
    pub fn distilgpt2() -> Self {
        Self {
            n_layer: 6,
            ..Self::gpt2()
        }
    }

    /// Small configuration for tests and demos
    pub fn tiny() -> Self {
        Self {
            vocab_size: 32,
            n_positions: 16,
            n_embd: 16,
            n_head: 2,
            n_layer: 2,
            layer_norm_epsilon: 1e-5,
            dropout: 0.0,
            initializer_range: 0.02,
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "gpt2" => Ok(Self::gpt2()),
            "gpt2-medium" => Ok(Self::gpt2_medium()),
            "distilgpt2" => Ok(Self::distilgpt2()),
            "tiny" => Ok(Self::tiny()),
            other => Err(Error::ConfigError(format!(
                "unknown model preset '{other}': expected gpt2, gpt2-medium, distilgpt2 or tiny"
            ))),
        }
    }

    /// Per-head dimension
    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }

    /// MLP hidden width (4× the embedding)
    pub fn n_inner(&self) -> usize {
        4 * self.n_embd
    }

    /// Check structural constraints
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 || self.n_positions == 0 || self.n_embd == 0 || self.n_layer == 0 {
            return Err(Error::ConfigError(
                "vocab_size, n_positions, n_embd and n_layer must be positive".into(),
            ));
        }
        if self.n_head == 0 || self.n_embd % self.n_head != 0 {
            return Err(Error::ConfigError(format!(
                "n_embd ({}) must be divisible by n_head ({})",
                self.n_embd, self.n_head
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::ConfigError(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

impl Default for GptConfig {
    fn default() -> Self {
        Self::gpt2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt2_preset() {
        let config = GptConfig::gpt2();
        assert_eq!(config.head_dim(), 64);
        assert_eq!(config.n_inner(), 3072);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_by_name() {
        assert_eq!(GptConfig::preset("gpt2-medium").unwrap().n_layer, 24);
        assert_eq!(GptConfig::preset("distilgpt2").unwrap().n_layer, 6);
        assert!(GptConfig::preset("gpt5").is_err());
    }

    #[test]
    fn test_indivisible_heads_rejected() {
        let config = GptConfig {
            n_head: 3,
            ..GptConfig::tiny()
        };
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = "vocab_size: 10\nn_positions: 8\nn_embd: 4\nn_head: 2\nn_layer: 1\n";
        let config: GptConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.layer_norm_epsilon, 1e-5);
        assert_eq!(config.dropout, 0.0);
        assert_eq!(config.initializer_range, 0.02);
    }
}
