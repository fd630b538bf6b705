//! Building models, plans, optimizers and corpora from a [`RunSpec`]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::schema::RunSpec;
use super::validate::validate_config;
use crate::autograd::Context;
use crate::error::{Error, Result};
use crate::lowrank::LoraConfig;
use crate::optim::{Adam, Optimizer, SGD};
use crate::patch::{apply_plan, PatchPlan};
use crate::tokenizer::{BpeTokenizer, CharTokenizer, Tokenizer};
use crate::train::{EpochReport, FineTuner, TokenBatch};
use crate::transformer::GptModel;

/// Load a run specification from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunSpec> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))
}

/// Base model: pretrained weights when `model.path` is set, seeded random init otherwise
pub fn build_model(spec: &RunSpec) -> Result<GptModel> {
    let config = spec.model.gpt_config()?;
    match &spec.model.path {
        Some(path) => GptModel::from_safetensors(path, &config),
        None => GptModel::new(&config, spec.training.seed),
    }
}

/// Substitution plan from the `lowrank` section
pub fn build_plan(spec: &RunSpec) -> Result<PatchPlan> {
    let lowrank = &spec.lowrank;
    let plan = PatchPlan::new(&lowrank.layers, &lowrank.ranks, &lowrank.sublayers, lowrank.method)?;
    // Rank is set per entry when the plan is applied
    let lora = LoraConfig {
        rank: 1,
        alpha: lowrank.lora.alpha,
        freeze_base: lowrank.lora.freeze_base,
        init_std: lowrank.lora.init_std,
        seed: spec.training.seed,
    };
    Ok(plan.with_lora(lora))
}

/// Optimizer from the `optimizer` section
pub fn build_optimizer(spec: &RunSpec) -> Result<Box<dyn Optimizer>> {
    let optim = &spec.optimizer;
    match optim.name.as_str() {
        "adam" => Ok(Box::new(Adam::default_params(optim.lr))),
        "sgd" => Ok(Box::new(SGD::new(optim.lr, optim.momentum))),
        other => Err(Error::ConfigError(format!(
            "Unknown optimizer: {other}. Valid optimizers: adam, sgd"
        ))),
    }
}

/// Directory searched for tokenizer files next to pretrained weights
fn weights_dir(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Tokenizer for a run
///
/// A GPT-2 BPE vocabulary is loaded from `data.tokenizer`, or from the weights'
/// directory when `model.path` is set, so token ids line up with pretrained
/// embeddings. Randomly initialized models get a character vocabulary of at
/// most `vocab_size` fitted to `train_text`.
///
/// # Errors
/// Missing or malformed tokenizer files, and a BPE vocabulary larger than the
/// model's embedding table.
pub fn build_tokenizer(
    spec: &RunSpec,
    train_text: &str,
    vocab_size: usize,
) -> Result<Box<dyn Tokenizer>> {
    let source = match (&spec.data.tokenizer, &spec.model.path) {
        (Some(path), _) => path.clone(),
        (None, Some(weights)) => weights_dir(weights),
        (None, None) => {
            let mut tokenizer = CharTokenizer::new()
                .with_max_vocab(vocab_size)
                .with_lowercase(spec.data.lowercase);
            tokenizer.train(&[train_text])?;
            return Ok(Box::new(tokenizer));
        }
    };

    let tokenizer = if source.is_dir() {
        BpeTokenizer::from_dir(&source)?
    } else {
        BpeTokenizer::from_file(&source)?
    };
    if tokenizer.vocab_size() > vocab_size {
        return Err(Error::ConfigError(format!(
            "Tokenizer {} has {} tokens but the model embeds {vocab_size}",
            source.display(),
            tokenizer.vocab_size()
        )));
    }
    Ok(Box::new(tokenizer))
}

/// Tokenized training and evaluation data
pub struct Corpus {
    pub tokenizer: Box<dyn Tokenizer>,
    pub train: Vec<TokenBatch>,
    pub eval: Vec<TokenBatch>,
}

impl fmt::Debug for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Corpus")
            .field("vocab_size", &self.tokenizer.vocab_size())
            .field("train", &self.train.len())
            .field("eval", &self.eval.len())
            .finish()
    }
}

/// Read both text files, tokenize them with [`build_tokenizer`] and cut each
/// stream into batches
pub fn load_corpus(spec: &RunSpec, vocab_size: usize) -> Result<Corpus> {
    let data = &spec.data;
    let normalize = |text: String| if data.lowercase { text.to_lowercase() } else { text };
    let train_text = normalize(fs::read_to_string(&data.train)?);
    let eval_text = normalize(fs::read_to_string(&data.eval)?);

    let tokenizer = build_tokenizer(spec, &train_text, vocab_size)?;

    let batches = |text: &str, name: &str, path: &Path| -> Result<Vec<TokenBatch>> {
        let ids = tokenizer.encode(text)?;
        let batches = TokenBatch::chunk_stream(&ids, data.seq_len, data.batch_size)?;
        if batches.is_empty() {
            return Err(Error::ConfigError(format!(
                "{name} data {} holds {} tokens, fewer than seq_len {}",
                path.display(),
                ids.len(),
                data.seq_len
            )));
        }
        Ok(batches)
    };
    let train = batches(&train_text, "Training", &data.train)?;
    let eval = batches(&eval_text, "Evaluation", &data.eval)?;

    Ok(Corpus {
        tokenizer,
        train,
        eval,
    })
}

/// Validate, build, patch and fine-tune as described by `spec`
pub fn train_from_spec(spec: &RunSpec) -> Result<Vec<EpochReport>> {
    validate_config(spec).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;

    let plan = build_plan(spec)?;
    let device = spec.training.device;
    let mut model = build_model(spec)?;
    apply_plan(&plan, &mut model, &device)?;

    let corpus = load_corpus(spec, model.config().vocab_size)?;
    let optimizer = build_optimizer(spec)?;
    let mut trainer = FineTuner::new(optimizer, spec.training.epochs);
    let mut ctx = Context::with_seed(device, spec.training.seed);

    trainer.fit(&mut model, &corpus.train, &corpus.eval, &mut ctx)
}

/// Load a YAML file and run [`train_from_spec`]
///
/// ```no_run
/// use rango::config::train_from_yaml;
///
/// let reports = train_from_yaml("finetune.yaml")?;
/// println!("final perplexity: {:.2}", reports[reports.len() - 1].perplexity);
/// # Ok::<(), rango::Error>(())
/// ```
pub fn train_from_yaml<P: AsRef<Path>>(config_path: P) -> Result<Vec<EpochReport>> {
    let spec = load_config(config_path)?;
    train_from_spec(&spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lowrank::{LowRankMethod, Projection};
    use crate::nn::Module;
    use crate::tokenizer::TokenizerError;
    use tempfile::TempDir;

    const TEXT: &str = "the quick brown fox jumps over the lazy dog. ";

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("train.txt"), TEXT.repeat(8)).unwrap();
            fs::write(dir.path().join("eval.txt"), TEXT.repeat(2)).unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn yaml(&self, method: &str) -> String {
            format!(
                r"
model:
  preset: tiny
data:
  train: {train}
  eval: {eval}
  seq_len: 8
  batch_size: 4
lowrank:
  method: {method}
  layers: [0, 1]
  ranks: [2, 3]
  sublayers: [attn_c_proj, mlp_c_fc]
optimizer:
  name: adam
  lr: 0.001
training:
  epochs: 2
  seed: 3
",
                train = self.path("train.txt").display(),
                eval = self.path("eval.txt").display(),
            )
        }

        fn spec(&self, method: &str) -> RunSpec {
            serde_yaml::from_str(&self.yaml(method)).unwrap()
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let fx = Fixture::new();
        let path = fx.path("run.yaml");
        fs::write(&path, fx.yaml("lora")).unwrap();
        let spec = load_config(&path).unwrap();
        assert_eq!(spec.lowrank.method, LowRankMethod::Lora);
        assert_eq!(spec.data.seq_len, 8);
    }

    #[test]
    fn test_load_config_errors() {
        let fx = Fixture::new();
        assert!(matches!(
            load_config(fx.path("missing.yaml")),
            Err(Error::ConfigError(_))
        ));
        let path = fx.path("bad.yaml");
        fs::write(&path, "data: [unclosed").unwrap();
        assert!(matches!(load_config(&path), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_build_model_seeded() {
        let fx = Fixture::new();
        let spec = fx.spec("svd");
        let a = build_model(&spec).unwrap();
        let b = build_model(&spec).unwrap();
        assert_eq!(a.num_layers(), 2);
        assert_eq!(a.wte.weight.to_vec(), b.wte.weight.to_vec());
    }

    #[test]
    fn test_build_plan_carries_lora_options() {
        let fx = Fixture::new();
        let mut spec = fx.spec("lora");
        spec.lowrank.lora.freeze_base = true;
        let plan = build_plan(&spec).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.method(), LowRankMethod::Lora);

        let mut model = build_model(&spec).unwrap();
        plan.apply(&mut model, &spec.training.device).unwrap();
        let Projection::Adapted(lora) = model.slot(1, crate::transformer::Sublayer::MlpCFc).unwrap()
        else {
            panic!("expected a LoRA slot");
        };
        assert_eq!(lora.rank(), 3);
        assert_eq!(lora.base().num_trainable_parameters(), 0);
    }

    #[test]
    fn test_build_optimizer() {
        let fx = Fixture::new();
        let mut spec = fx.spec("svd");
        assert_eq!(build_optimizer(&spec).unwrap().lr(), 0.001);
        spec.optimizer.name = "sgd".into();
        assert_eq!(build_optimizer(&spec).unwrap().lr(), 0.001);
        spec.optimizer.name = "lamb".into();
        assert!(build_optimizer(&spec).is_err());
    }

    #[test]
    fn test_load_corpus() {
        let fx = Fixture::new();
        let spec = fx.spec("svd");
        let corpus = load_corpus(&spec, 32).unwrap();
        // 360 training chars -> 45 windows of 8 -> 12 batches
        assert_eq!(corpus.train.len(), 12);
        assert_eq!(corpus.train[11].batch_size(), 1);
        assert_eq!(corpus.eval.len(), 3);
        assert!(corpus.tokenizer.vocab_size() <= 32);
        assert!(corpus
            .train
            .iter()
            .all(|b| b.input_ids().iter().all(|&id| (id as usize) < 32)));
    }

    /// Byte-level vocabulary covering `TEXT`, with `the` merged to one token
    fn write_gpt2_tokenizer(path: &Path) {
        let mut tokens: Vec<String> = TEXT
            .bytes()
            .map(|b| crate::tokenizer::bytes_to_unicode()[b as usize].to_string())
            .collect();
        tokens.sort();
        tokens.dedup();
        tokens.extend(["th".to_string(), "the".to_string()]);
        let vocab: std::collections::HashMap<String, u32> =
            tokens.into_iter().enumerate().map(|(id, t)| (t, id as u32)).collect();
        let json = serde_json::json!({
            "model": { "vocab": vocab, "merges": ["t h", "th e"] },
            "added_tokens": []
        });
        fs::write(path, json.to_string()).unwrap();
    }

    #[test]
    fn test_load_corpus_with_gpt2_tokenizer() {
        let fx = Fixture::new();
        write_gpt2_tokenizer(&fx.path("tokenizer.json"));
        let mut spec = fx.spec("svd");
        spec.data.tokenizer = Some(fx.path("tokenizer.json"));

        let corpus = load_corpus(&spec, 32).unwrap();
        // 28 byte symbols plus two merges
        assert_eq!(corpus.tokenizer.vocab_size(), 30);
        assert_eq!(corpus.tokenizer.encode("the").unwrap().len(), 1);
        // Each 45-byte sentence is 41 tokens: 328 tokens -> 41 windows -> 11 batches
        assert_eq!(corpus.train.len(), 11);
        assert!(corpus
            .train
            .iter()
            .all(|b| b.input_ids().iter().all(|&id| (id as usize) < 30)));
    }

    #[test]
    fn test_pretrained_weights_select_gpt2_tokenizer() {
        let fx = Fixture::new();
        let mut spec = fx.spec("svd");
        spec.model.path = Some(fx.path("model.safetensors"));

        let err = build_tokenizer(&spec, TEXT, 32).err().unwrap();
        assert!(matches!(err, Error::Tokenizer(TokenizerError::MissingFiles(_))));

        write_gpt2_tokenizer(&fx.path("tokenizer.json"));
        let tokenizer = build_tokenizer(&spec, TEXT, 32).unwrap();
        assert_eq!(tokenizer.vocab_size(), 30);

        let err = build_tokenizer(&spec, TEXT, 16).err().unwrap();
        assert!(err.to_string().contains("model embeds 16"));
    }

    #[test]
    fn test_random_init_fits_char_vocabulary() {
        let fx = Fixture::new();
        let spec = fx.spec("svd");
        let tokenizer = build_tokenizer(&spec, TEXT, 32).unwrap();
        assert_eq!(tokenizer.encode("the").unwrap().len(), 3);
    }

    #[test]
    fn test_load_corpus_too_short() {
        let fx = Fixture::new();
        fs::write(fx.path("eval.txt"), "tiny").unwrap();
        let spec = fx.spec("svd");
        let err = load_corpus(&spec, 32).unwrap_err();
        assert!(err.to_string().contains("Evaluation"));
    }

    #[test]
    fn test_train_from_yaml() {
        let fx = Fixture::new();
        let path = fx.path("run.yaml");
        fs::write(&path, fx.yaml("svd")).unwrap();
        let reports = train_from_yaml(&path).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|r| r.mean_loss.is_finite() && r.perplexity.is_finite()));
    }

    #[test]
    fn test_train_rejects_invalid_spec() {
        let fx = Fixture::new();
        let mut spec = fx.spec("lora");
        spec.lowrank.layers = vec![0, 5];
        let err = train_from_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
