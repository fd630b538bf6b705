//! Validated substitution plans

use std::collections::HashSet;

use crate::device::ComputeDevice;
use crate::error::{Error, Result};
use crate::lowrank::{LoraConfig, LowRankMethod, Projection};
use crate::nn::Module;
use crate::transformer::{GptModel, Sublayer};

use super::ParamDelta;

/// One slot to substitute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchEntry {
    pub layer: usize,
    pub sublayer: Sublayer,
    pub rank: usize,
}

/// Ordered list of `(layer, sublayer, rank)` substitutions of one kind
#[derive(Debug, Clone)]
pub struct PatchPlan {
    entries: Vec<PatchEntry>,
    method: LowRankMethod,
    lora: LoraConfig,
}

impl PatchPlan {
    /// Zip parallel lists into a plan
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] when the lists differ in length or a rank is 0.
    pub fn new(
        layers: &[usize],
        ranks: &[usize],
        sublayers: &[Sublayer],
        method: LowRankMethod,
    ) -> Result<Self> {
        check_lengths(layers.len(), ranks.len(), sublayers.len())?;
        if let Some(pos) = ranks.iter().position(|&r| r == 0) {
            return Err(Error::InvalidArgument(format!(
                "rank must be at least 1 (entry {pos})"
            )));
        }

        let entries = layers
            .iter()
            .zip(ranks)
            .zip(sublayers)
            .map(|((&layer, &rank), &sublayer)| PatchEntry {
                layer,
                sublayer,
                rank,
            })
            .collect();

        Ok(Self {
            entries,
            method,
            lora: LoraConfig::new(1),
        })
    }

    /// Build a plan from string tags (`"svd"`/`"lora"`, `"attn_c_proj"`, ...)
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for mismatched lengths or an unknown method,
    /// [`Error::UnknownSublayer`] for an unknown sublayer tag.
    pub fn from_tags<S: AsRef<str>>(
        layers: &[usize],
        ranks: &[usize],
        sublayers: &[S],
        method: &str,
    ) -> Result<Self> {
        check_lengths(layers.len(), ranks.len(), sublayers.len())?;
        let method: LowRankMethod = method.parse()?;
        let sublayers = sublayers
            .iter()
            .map(|tag| tag.as_ref().parse())
            .collect::<Result<Vec<Sublayer>>>()?;
        Self::new(layers, ranks, &sublayers, method)
    }

    /// LoRA options shared by every entry; entry `i` uses seed `lora.seed + i`
    pub fn with_lora(mut self, lora: LoraConfig) -> Self {
        self.lora = lora;
        self
    }

    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    pub fn method(&self) -> LowRankMethod {
        self.method
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every entry addresses a distinct, still-dense slot of `model`
    pub fn validate(&self, model: &GptModel) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            let slot = model.slot(entry.layer, entry.sublayer)?;
            if !seen.insert((entry.layer, entry.sublayer)) {
                return Err(already_substituted(entry, self.method.as_str()));
            }
            if slot.as_dense().is_none() {
                return Err(already_substituted(entry, slot.kind()));
            }
        }
        Ok(())
    }

    /// Substitute every entry, move the model to `device` and report the
    /// trainable-parameter change
    ///
    /// The whole plan and the device are validated first, so addressing errors
    /// leave every slot untouched. A failed decomposition stops the plan at
    /// that entry; slots replaced before it stay replaced.
    pub fn apply(&self, model: &mut GptModel, device: &ComputeDevice) -> Result<ParamDelta> {
        self.validate(model)?;
        device.ensure_available()?;
        let before = model.num_trainable_parameters();

        for (i, entry) in self.entries.iter().enumerate() {
            let slot = model.slot_mut(entry.layer, entry.sublayer)?;
            let dense = slot
                .as_dense()
                .ok_or_else(|| already_substituted(entry, slot.kind()))?;
            let lora = LoraConfig {
                seed: self.lora.seed.wrapping_add(i as u64),
                ..self.lora.clone()
            };
            *slot = Projection::low_rank(dense, self.method, entry.rank, &lora)?;
        }

        model.to_device(*device)?;
        let after = model.num_trainable_parameters();
        Ok(ParamDelta::new(before, after))
    }
}

fn check_lengths(layers: usize, ranks: usize, sublayers: usize) -> Result<()> {
    if layers != ranks || layers != sublayers {
        return Err(Error::InvalidArgument(format!(
            "layers ({layers}), ranks ({ranks}) and sublayers ({sublayers}) must have equal length"
        )));
    }
    Ok(())
}

fn already_substituted(entry: &PatchEntry, kind: &str) -> Error {
    Error::AlreadySubstituted {
        layer: entry.layer,
        sublayer: entry.sublayer.to_string(),
        kind: kind.to_string(),
    }
}
