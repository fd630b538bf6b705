//! Crate-wide error type

use crate::tokenizer::TokenizerError;
use thiserror::Error;

/// Result type alias for rango operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by patching, training and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Precondition violation detected before any model mutation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Block index outside the model
    #[error("Layer index {index} out of range: model has {num_layers} blocks")]
    LayerIndexOutOfRange { index: usize, num_layers: usize },

    /// Sublayer tag outside the fixed enumeration
    #[error("Unknown sublayer '{0}': expected one of attn_c_attn, attn_c_proj, mlp_c_fc, mlp_c_proj")]
    UnknownSublayer(String),

    /// Slot already holds a low-rank substitution
    #[error("Layer {layer} {sublayer} is already substituted ({kind})")]
    AlreadySubstituted {
        layer: usize,
        sublayer: String,
        kind: String,
    },

    /// Tensor shape does not match what the layer expects
    #[error("Shape mismatch for {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Singular value decomposition failed
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// Requested compute device cannot execute
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    /// Pretrained weight loading failed
    #[error("Weight loading error: {0}")]
    Weights(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_index_message() {
        let err = Error::LayerIndexOutOfRange {
            index: 14,
            num_layers: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("14"));
        assert!(msg.contains("12 blocks"));
    }

    #[test]
    fn test_tokenizer_error_converts() {
        let err: Error = TokenizerError::NotTrained.into();
        assert!(matches!(err, Error::Tokenizer(_)));
    }
}
