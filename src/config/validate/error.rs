//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Model path does not exist: {0}")]
    ModelPathNotFound(String),

    #[error("Training data path does not exist: {0}")]
    TrainDataNotFound(String),

    #[error("Evaluation data path does not exist: {0}")]
    EvalDataNotFound(String),

    #[error("Tokenizer path does not exist: {0}")]
    TokenizerPathNotFound(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid learning rate: {0} (must be > 0.0 and <= 1.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid momentum: {0} (must be in [0.0, 1.0))")]
    InvalidMomentum(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid sequence length: {seq_len} (must be in [2, {max}])")]
    InvalidSeqLen { seq_len: usize, max: usize },

    #[error("Invalid optimizer: {0} (must be one of: adam, sgd)")]
    InvalidOptimizer(String),

    #[error("Low-rank lists differ in length: {layers} layers, {ranks} ranks, {sublayers} sublayers")]
    PlanLengthMismatch {
        layers: usize,
        ranks: usize,
        sublayers: usize,
    },

    #[error("Invalid rank: {0} (must be > 0)")]
    InvalidRank(usize),

    #[error("Layer index {index} out of range for a {num_layers}-block model")]
    LayerOutOfRange { index: usize, num_layers: usize },

    #[error("Invalid LoRA alpha: {0} (must be > 0.0)")]
    InvalidLoraAlpha(f32),

    #[error("Invalid LoRA init std: {0} (must be > 0.0)")]
    InvalidLoraInitStd(f32),
}
