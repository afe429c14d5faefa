//! Forced first interaction: rescale the photon weight by the probability
//! of interacting at all, then sample a free-path distance guaranteed to
//! stay inside the detector.

use crate::sampler::Sampler;

/// Result of forcing the first interaction.
#[derive(Clone, Copy, Debug)]
pub struct ForcedInteraction {
    /// Free paths to travel to the forced interaction point.
    pub fp_to_go: f64,
    /// The weight removed from the photon by the rescale.
    pub weight_decrement: f64,
}

/// Adjusts `weight` by the interaction probability `1 - exp(-fp_to_exit)`
/// and samples the truncated free-path distance.
///
/// The truncation folds a unit exponential draw into `[0, fp_to_exit)` by
/// dropping its whole-number multiples of `fp_to_exit`; a roundoff overshoot
/// is clamped to the boundary.
pub fn truncated_free_paths(
    fp_to_exit: f64,
    weight: &mut f64,
    sampler: &mut dyn Sampler,
) -> ForcedInteraction {
    let new_weight = *weight * (1.0 - (-fp_to_exit).exp());
    let weight_decrement = *weight - new_weight;
    *weight = new_weight;

    let rand_from_exp = sampler.free_paths();
    let whole = (rand_from_exp / fp_to_exit).floor();
    let mut fp_to_go = (rand_from_exp / fp_to_exit - whole) * fp_to_exit;
    if fp_to_go > fp_to_exit {
        // infrequent numerical condition; clamp to the boundary
        fp_to_go = fp_to_exit;
    }

    ForcedInteraction {
        fp_to_go,
        weight_decrement,
    }
}
