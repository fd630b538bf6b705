//! Substitutable projection slot

use super::{LoraConfig, LoraLinear, LowRankMethod, SvdLinear};
use crate::autograd::Context;
use crate::error::Result;
use crate::nn::{Linear, Module};
use crate::Tensor;

/// A transformer projection: the original dense layer or a low-rank substitute
#[derive(Debug, Clone)]
pub enum Projection {
    Dense(Linear),
    Factorized(SvdLinear),
    Adapted(LoraLinear),
}

impl Projection {
    pub fn forward(&self, x: &Tensor, ctx: &Context) -> Tensor {
        match self {
            Self::Dense(layer) => layer.forward(x, ctx),
            Self::Factorized(layer) => layer.forward(x, ctx),
            Self::Adapted(layer) => layer.forward(x, ctx),
        }
    }

    /// Build the rank-`rank` substitute for a dense layer
    ///
    /// `lora` supplies alpha, base freezing, init and seed for
    /// [`LowRankMethod::Lora`]; its own rank is ignored.
    pub fn low_rank(
        layer: &Linear,
        method: LowRankMethod,
        rank: usize,
        lora: &LoraConfig,
    ) -> Result<Self> {
        match method {
            LowRankMethod::Svd => Ok(Self::Factorized(SvdLinear::from_linear(layer, Some(rank))?)),
            LowRankMethod::Lora => Ok(Self::Adapted(LoraLinear::from_linear(
                layer,
                &LoraConfig {
                    rank,
                    ..lora.clone()
                },
            )?)),
        }
    }

    pub fn as_dense(&self) -> Option<&Linear> {
        match self {
            Self::Dense(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn in_features(&self) -> usize {
        match self {
            Self::Dense(layer) => layer.in_features(),
            Self::Factorized(layer) => layer.in_features(),
            Self::Adapted(layer) => layer.base().in_features(),
        }
    }

    pub fn out_features(&self) -> usize {
        match self {
            Self::Dense(layer) => layer.out_features(),
            Self::Factorized(layer) => layer.out_features(),
            Self::Adapted(layer) => layer.base().out_features(),
        }
    }

    /// Short tag: `dense`, `svd` or `lora`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dense(_) => "dense",
            Self::Factorized(_) => LowRankMethod::Svd.as_str(),
            Self::Adapted(_) => LowRankMethod::Lora.as_str(),
        }
    }
}

impl From<Linear> for Projection {
    fn from(layer: Linear) -> Self {
        Self::Dense(layer)
    }
}

impl Module for Projection {
    fn parameters(&self) -> Vec<&Tensor> {
        match self {
            Self::Dense(layer) => layer.parameters(),
            Self::Factorized(layer) => layer.parameters(),
            Self::Adapted(layer) => layer.parameters(),
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        match self {
            Self::Dense(layer) => layer.parameters_mut(),
            Self::Factorized(layer) => layer.parameters_mut(),
            Self::Adapted(layer) => layer.parameters_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_rank_variants() {
        let dense = Linear::new(6, 4, 0.1, 0);
        let svd = Projection::low_rank(&dense, LowRankMethod::Svd, 2, &LoraConfig::new(1)).unwrap();
        let lora = Projection::low_rank(&dense, LowRankMethod::Lora, 2, &LoraConfig::new(1)).unwrap();
        assert_eq!(svd.kind(), "svd");
        assert_eq!(lora.kind(), "lora");
        assert_eq!(svd.in_features(), 6);
        assert_eq!(lora.out_features(), 4);
        assert!(svd.as_dense().is_none());
    }

    #[test]
    fn test_trainable_counts_by_variant() {
        let dense = Linear::new(4, 4, 0.1, 0);
        let slot = Projection::from(dense.clone());
        assert_eq!(slot.num_trainable_parameters(), 20);

        let svd = Projection::low_rank(&dense, LowRankMethod::Svd, 2, &LoraConfig::new(1)).unwrap();
        assert_eq!(svd.num_trainable_parameters(), 12);

        let lora = Projection::low_rank(&dense, LowRankMethod::Lora, 2, &LoraConfig::new(1)).unwrap();
        assert_eq!(lora.num_trainable_parameters(), 36);

        let frozen =
            Projection::low_rank(&dense, LowRankMethod::Lora, 2, &LoraConfig::new(8).freeze_base(true))
                .unwrap();
        assert_eq!(frozen.num_trainable_parameters(), 16);
    }

    #[test]
    fn test_forward_shapes_agree() {
        let dense = Linear::new(6, 4, 0.1, 0);
        let ctx = Context::default();
        let x = Tensor::zeros(&[3, 6], false);
        for method in [LowRankMethod::Svd, LowRankMethod::Lora] {
            let slot = Projection::low_rank(&dense, method, 3, &LoraConfig::new(1).seed(1)).unwrap();
            assert_eq!(slot.forward(&x, &ctx).shape(), &[3, 4]);
        }
    }
}
