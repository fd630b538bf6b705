//! Model patching: swap dense projections for low-rank substitutes
//!
//! A patch is a list of `(block index, sublayer, rank)` entries plus one
//! [`LowRankMethod`]. Applying it replaces each addressed slot of a
//! [`GptModel`] exactly once and reports how the trainable-parameter count
//! changed.

mod plan;
mod report;

pub use plan::{PatchEntry, PatchPlan};
pub use report::ParamDelta;

use crate::device::ComputeDevice;
use crate::error::Result;
use crate::lowrank::LowRankMethod;
use crate::transformer::{GptModel, Sublayer};

/// Substitute `layers[i]`/`sublayers[i]` with a rank-`ranks[i]` layer of kind
/// `method`, move the model to `device` and print the parameter report
///
/// The model is patched in place. There is no rollback: when an SVD fails
/// partway through, earlier entries remain substituted.
///
/// # Errors
/// - [`crate::Error::InvalidArgument`] if the lists differ in length or a rank is 0
/// - [`crate::Error::LayerIndexOutOfRange`] for a block index past the model
/// - [`crate::Error::AlreadySubstituted`] for a slot that is not dense
/// - [`crate::Error::Decomposition`] if an SVD fails
pub fn apply_low_rank(
    model: &mut GptModel,
    layers: &[usize],
    ranks: &[usize],
    sublayers: &[Sublayer],
    device: &ComputeDevice,
    method: LowRankMethod,
) -> Result<ParamDelta> {
    let plan = PatchPlan::new(layers, ranks, sublayers, method)?;
    apply_plan(&plan, model, device)
}

/// [`apply_low_rank`] with string tags for the sublayers and the method
pub fn apply_low_rank_tags<S: AsRef<str>>(
    model: &mut GptModel,
    layers: &[usize],
    ranks: &[usize],
    sublayers: &[S],
    device: &ComputeDevice,
    method: &str,
) -> Result<ParamDelta> {
    let plan = PatchPlan::from_tags(layers, ranks, sublayers, method)?;
    apply_plan(&plan, model, device)
}

/// Apply a prepared plan and print the parameter report
pub fn apply_plan(
    plan: &PatchPlan,
    model: &mut GptModel,
    device: &ComputeDevice,
) -> Result<ParamDelta> {
    let delta = plan.apply(model, device)?;
    println!("{delta}");
    Ok(delta)
}
