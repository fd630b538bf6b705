//! Low-rank substitutes for dense projections
//!
//! - [`SvdLinear`]: the dense weight is replaced by a truncated factorization
//!   `(U·S)·Vᵀ`; `U·S` is frozen, `V` and the bias train.
//! - [`LoraLinear`]: the dense weight is kept and a product `A·B` is added to it.
//! - [`Projection`]: the slot type a transformer holds, dense or substituted.

mod lora;
mod projection;
mod svd;

pub use lora::{LoraConfig, LoraLinear};
pub use projection::Projection;
pub use svd::SvdLinear;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which substitution to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LowRankMethod {
    Lora,
    Svd,
}

impl LowRankMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lora => "lora",
            Self::Svd => "svd",
        }
    }
}

impl fmt::Display for LowRankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LowRankMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lora" => Ok(Self::Lora),
            "svd" => Ok(Self::Svd),
            other => Err(Error::InvalidArgument(format!(
                "unknown low-rank method '{other}': expected one of lora, svd"
            ))),
        }
    }
}
