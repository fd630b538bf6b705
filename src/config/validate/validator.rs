//! Configuration validation logic

use super::error::ValidationError;
use crate::config::schema::RunSpec;

/// Validate a run specification
///
/// Checks:
/// - File paths exist
/// - The model architecture resolves and is consistent
/// - Numeric values are in valid ranges
/// - The low-rank lists line up and address existing blocks
pub fn validate_config(spec: &RunSpec) -> Result<(), ValidationError> {
    if let Some(path) = &spec.model.path {
        if !path.exists() {
            return Err(ValidationError::ModelPathNotFound(path.display().to_string()));
        }
    }
    if !spec.data.train.exists() {
        return Err(ValidationError::TrainDataNotFound(
            spec.data.train.display().to_string(),
        ));
    }
    if !spec.data.eval.exists() {
        return Err(ValidationError::EvalDataNotFound(
            spec.data.eval.display().to_string(),
        ));
    }
    if let Some(path) = &spec.data.tokenizer {
        if !path.exists() {
            return Err(ValidationError::TokenizerPathNotFound(path.display().to_string()));
        }
    }

    let model = spec
        .model
        .gpt_config()
        .map_err(|e| ValidationError::InvalidModel(e.to_string()))?;
    model
        .validate()
        .map_err(|e| ValidationError::InvalidModel(e.to_string()))?;

    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }
    // The causal loss needs at least one next-token target per sequence
    if spec.data.seq_len < 2 || spec.data.seq_len > model.n_positions {
        return Err(ValidationError::InvalidSeqLen {
            seq_len: spec.data.seq_len,
            max: model.n_positions,
        });
    }

    if spec.optimizer.lr <= 0.0 || spec.optimizer.lr > 1.0 {
        return Err(ValidationError::InvalidLearningRate(spec.optimizer.lr));
    }
    if !["adam", "sgd"].contains(&spec.optimizer.name.as_str()) {
        return Err(ValidationError::InvalidOptimizer(spec.optimizer.name.clone()));
    }
    if !(0.0..1.0).contains(&spec.optimizer.momentum) {
        return Err(ValidationError::InvalidMomentum(spec.optimizer.momentum));
    }

    if spec.training.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(spec.training.epochs));
    }

    let plan = &spec.lowrank;
    if plan.layers.len() != plan.ranks.len() || plan.layers.len() != plan.sublayers.len() {
        return Err(ValidationError::PlanLengthMismatch {
            layers: plan.layers.len(),
            ranks: plan.ranks.len(),
            sublayers: plan.sublayers.len(),
        });
    }
    if let Some(&rank) = plan.ranks.iter().find(|&&r| r == 0) {
        return Err(ValidationError::InvalidRank(rank));
    }
    if let Some(&index) = plan.layers.iter().find(|&&l| l >= model.n_layer) {
        return Err(ValidationError::LayerOutOfRange {
            index,
            num_layers: model.n_layer,
        });
    }

    if let Some(alpha) = plan.lora.alpha {
        if alpha <= 0.0 {
            return Err(ValidationError::InvalidLoraAlpha(alpha));
        }
    }
    if plan.lora.init_std <= 0.0 {
        return Err(ValidationError::InvalidLoraInitStd(plan.lora.init_std));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DataSpec, LowRankSpec, ModelSpec, OptimSpec, TrainingParams};
    use crate::lowrank::LowRankMethod;
    use crate::transformer::Sublayer;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    struct Fixture {
        _train: NamedTempFile,
        _eval: NamedTempFile,
        spec: RunSpec,
    }

    fn fixture() -> Fixture {
        let train = NamedTempFile::new().unwrap();
        let eval = NamedTempFile::new().unwrap();
        let spec = RunSpec {
            model: ModelSpec {
                preset: "tiny".into(),
                ..ModelSpec::default()
            },
            data: DataSpec {
                train: train.path().to_path_buf(),
                eval: eval.path().to_path_buf(),
                seq_len: 8,
                batch_size: 2,
                lowercase: false,
                tokenizer: None,
            },
            lowrank: LowRankSpec {
                method: LowRankMethod::Svd,
                layers: vec![0, 1],
                ranks: vec![2, 2],
                sublayers: vec![Sublayer::AttnCProj, Sublayer::MlpCFc],
                lora: Default::default(),
            },
            optimizer: OptimSpec::default(),
            training: TrainingParams::default(),
        };
        Fixture {
            _train: train,
            _eval: eval,
            spec,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&fixture().spec).is_ok());
    }

    #[test]
    fn test_missing_data() {
        let mut f = fixture();
        f.spec.data.eval = PathBuf::from("/nonexistent/eval.txt");
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::EvalDataNotFound(_))
        ));
    }

    #[test]
    fn test_missing_tokenizer() {
        let mut f = fixture();
        f.spec.data.tokenizer = Some(PathBuf::from("/nonexistent/tokenizer.json"));
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::TokenizerPathNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_preset() {
        let mut f = fixture();
        f.spec.model.preset = "gpt5".into();
        assert!(matches!(validate_config(&f.spec), Err(ValidationError::InvalidModel(_))));
    }

    #[test]
    fn test_seq_len_bounds() {
        let mut f = fixture();
        f.spec.data.seq_len = 1;
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::InvalidSeqLen { .. })
        ));
        f.spec.data.seq_len = 17;
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::InvalidSeqLen { max: 16, .. })
        ));
    }

    #[test]
    fn test_optimizer_checks() {
        let mut f = fixture();
        f.spec.optimizer.lr = 0.0;
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::InvalidLearningRate(_))
        ));
        f.spec.optimizer.lr = 0.01;
        f.spec.optimizer.name = "lbfgs".into();
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::InvalidOptimizer(_))
        ));
    }

    #[test]
    fn test_plan_checks() {
        let mut f = fixture();
        f.spec.lowrank.ranks.pop();
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::PlanLengthMismatch { ranks: 1, .. })
        ));

        let mut f = fixture();
        f.spec.lowrank.ranks[1] = 0;
        assert!(matches!(validate_config(&f.spec), Err(ValidationError::InvalidRank(0))));

        let mut f = fixture();
        f.spec.lowrank.layers[0] = 2;
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::LayerOutOfRange { index: 2, num_layers: 2 })
        ));
    }

    #[test]
    fn test_lora_options() {
        let mut f = fixture();
        f.spec.lowrank.lora.alpha = Some(-1.0);
        assert!(matches!(
            validate_config(&f.spec),
            Err(ValidationError::InvalidLoraAlpha(_))
        ));
    }
}
