//! Weight loading for GPT-2 checkpoints
//!
//! Reads HuggingFace-style SafeTensors files into a name → [`Tensor`] map and
//! hands tensors to the layers' `from_params` constructors. Both bare names
//! (`h.0.attn.c_attn.weight`) and `transformer.`-prefixed names are accepted;
//! `lm_head.weight` is ignored because the output head is tied to `wte`.

mod convert;

use crate::error::{Error, Result};
use crate::nn::Linear;
use crate::Tensor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::config::GptConfig;
use super::model::GptModel;

const NAME_PREFIX: &str = "transformer.";

/// Load every floating-point tensor from SafeTensors file(s) at `model_path`
///
/// `model_path` is a `.safetensors` file or a directory holding
/// `model.safetensors` or sharded `*.safetensors` files.
pub fn load_safetensors_weights(model_path: &Path) -> Result<HashMap<String, Tensor>> {
    use safetensors::SafeTensors;

    let st_files = find_safetensors_files(model_path)?;
    if st_files.is_empty() {
        return Err(Error::Weights(format!(
            "No SafeTensors files found in {}",
            model_path.display()
        )));
    }

    let mut weights = HashMap::new();
    for st_path in &st_files {
        let data = std::fs::read(st_path)?;
        let tensors = SafeTensors::deserialize(&data).map_err(|e| {
            Error::Weights(format!("Failed to parse SafeTensors {}: {e}", st_path.display()))
        })?;

        for (name, view) in tensors.tensors() {
            let Some(values) = convert::tensor_to_f32_vec(&view) else {
                continue;
            };
            let name = name.strip_prefix(NAME_PREFIX).unwrap_or(&name).to_string();
            weights.insert(name, Tensor::from_shape_vec(view.shape(), values, true));
        }
    }

    Ok(weights)
}

/// Find SafeTensors files in a directory or return single file
fn find_safetensors_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        if path.extension().is_some_and(|e| e == "safetensors") {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        let single = path.join("model.safetensors");
        if single.exists() {
            files.push(single);
        } else {
            // Sharded: model-00001-of-00002.safetensors
            for entry in std::fs::read_dir(path)?.flatten() {
                let p = entry.path();
                if p.extension().is_some_and(|e| e == "safetensors") {
                    files.push(p);
                }
            }
            files.sort();
        }
    } else {
        return Err(Error::Weights(format!("{} does not exist", path.display())));
    }

    Ok(files)
}

/// Remove `name` from the map, checking its shape
pub(crate) fn take_param(
    params: &mut HashMap<String, Tensor>,
    name: &str,
    shape: &[usize],
) -> Result<Tensor> {
    let tensor = params
        .remove(name)
        .ok_or_else(|| Error::Weights(format!("missing tensor '{name}'")))?;
    if tensor.shape() != shape {
        return Err(Error::ShapeMismatch {
            context: name.to_string(),
            expected: shape.to_vec(),
            actual: tensor.shape().to_vec(),
        });
    }
    Ok(tensor)
}

/// Dense `Conv1D` projection from `{prefix}.weight` `[in, out]` and `{prefix}.bias` `[out]`
pub(crate) fn linear_from_params(
    params: &mut HashMap<String, Tensor>,
    prefix: &str,
    in_features: usize,
    out_features: usize,
) -> Result<Linear> {
    let weight = take_param(params, &format!("{prefix}.weight"), &[in_features, out_features])?;
    let bias = take_param(params, &format!("{prefix}.bias"), &[out_features])?;
    Linear::from_parts(weight, bias)
}

impl GptModel {
    /// Load a pretrained GPT-2 checkpoint
    ///
    /// # Errors
    /// [`Error::Weights`] / [`Error::ShapeMismatch`] when the checkpoint does
    /// not match `config`, [`Error::Io`] on read failure.
    pub fn from_safetensors(model_path: &Path, config: &GptConfig) -> Result<Self> {
        let params = load_safetensors_weights(model_path)?;
        Self::from_params(config, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::Context;
    use crate::nn::Module;
    use crate::train::TokenBatch;
    use crate::transformer::Sublayer;
    use safetensors::tensor::{Dtype, TensorView};

    /// Write `(name, shape, values)` entries as an F32 SafeTensors file
    fn write_checkpoint(path: &Path, entries: &[(String, Vec<usize>, Vec<f32>)]) {
        let bytes: Vec<(String, Vec<u8>, Vec<usize>)> = entries
            .iter()
            .map(|(name, shape, values)| {
                let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name.clone(), raw, shape.clone())
            })
            .collect();
        let views: Vec<(&str, TensorView<'_>)> = bytes
            .iter()
            .map(|(name, raw, shape)| {
                (name.as_str(), TensorView::new(Dtype::F32, shape.clone(), raw).unwrap())
            })
            .collect();
        let data = safetensors::serialize(views, None).unwrap();
        std::fs::write(path, data).unwrap();
    }

    /// Export a model's tensors under GPT-2 names
    fn checkpoint_entries(model: &GptModel, prefix: &str) -> Vec<(String, Vec<usize>, Vec<f32>)> {
        let mut entries = Vec::new();
        let mut push = |name: String, t: &Tensor| {
            entries.push((format!("{prefix}{name}"), t.shape().to_vec(), t.to_vec()));
        };
        push("wte.weight".into(), &model.wte.weight);
        push("wpe.weight".into(), &model.wpe.weight);
        for (i, block) in model.blocks.iter().enumerate() {
            push(format!("h.{i}.ln_1.weight"), &block.ln_1.weight);
            push(format!("h.{i}.ln_1.bias"), &block.ln_1.bias);
            push(format!("h.{i}.ln_2.weight"), &block.ln_2.weight);
            push(format!("h.{i}.ln_2.bias"), &block.ln_2.bias);
            for (sub, name) in [
                (Sublayer::AttnCAttn, "attn.c_attn"),
                (Sublayer::AttnCProj, "attn.c_proj"),
                (Sublayer::MlpCFc, "mlp.c_fc"),
                (Sublayer::MlpCProj, "mlp.c_proj"),
            ] {
                let dense = block.slot(sub).as_dense().unwrap();
                push(format!("h.{i}.{name}.weight"), dense.weight());
                push(format!("h.{i}.{name}.bias"), dense.bias());
            }
        }
        push("ln_f.weight".into(), &model.ln_f.weight);
        push("ln_f.bias".into(), &model.ln_f.bias);
        entries
    }

    #[test]
    fn test_roundtrip_checkpoint() {
        let config = GptConfig::tiny();
        let model = GptModel::new(&config, 11).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        write_checkpoint(&path, &checkpoint_entries(&model, ""));

        let loaded = GptModel::from_safetensors(&path, &config).unwrap();
        assert_eq!(loaded.num_parameters(), model.num_parameters());

        let ctx = Context::default();
        let batch = TokenBatch::new(vec![3, 1, 4, 1, 5], 1, 5).unwrap();
        let a = model.forward(&batch, &ctx).unwrap();
        let b = loaded.forward(&batch, &ctx).unwrap();
        assert_eq!(a.to_vec(), b.to_vec());
    }

    #[test]
    fn test_prefixed_names_from_directory() {
        let config = GptConfig::tiny();
        let model = GptModel::new(&config, 5).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut entries = checkpoint_entries(&model, "transformer.");
        entries.push(("lm_head.weight".into(), vec![32, 16], vec![0.0; 512]));
        write_checkpoint(&dir.path().join("model-00001-of-00001.safetensors"), &entries);

        let loaded = GptModel::from_safetensors(dir.path(), &config).unwrap();
        assert_eq!(loaded.wte.weight.to_vec(), model.wte.weight.to_vec());
    }

    #[test]
    fn test_missing_tensor_reported() {
        let config = GptConfig::tiny();
        let model = GptModel::new(&config, 5).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let entries: Vec<_> = checkpoint_entries(&model, "")
            .into_iter()
            .filter(|(name, _, _)| name != "h.1.mlp.c_fc.bias")
            .collect();
        write_checkpoint(&path, &entries);

        let err = GptModel::from_safetensors(&path, &config).unwrap_err();
        assert!(err.to_string().contains("h.1.mlp.c_fc.bias"));
    }

    #[test]
    fn test_shape_mismatch_reported() {
        let config = GptConfig::tiny();
        let model = GptModel::new(&config, 5).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        write_checkpoint(&path, &checkpoint_entries(&model, ""));

        let wrong = GptConfig {
            n_embd: 8,
            ..config
        };
        assert!(matches!(
            GptModel::from_safetensors(&path, &wrong),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_safetensors_weights(dir.path()),
            Err(Error::Weights(_))
        ));
    }
}
