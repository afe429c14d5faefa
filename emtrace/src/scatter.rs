//! Probabilistic selection of what happens at an interaction point, and the
//! application of the chosen scatter kernel.

use crate::consts::MIN_PHOTON_ENERGY;
use crate::photon::Photon;
use crate::sampler::Sampler;
use crate::xsection::CrossSection;

/// What a photon does at an interaction point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhotonAction {
    /// Photo-electric absorption.
    Absorb,
    /// Compton scatter.
    ComptonScatter,
    /// Coherent (Rayleigh) scatter.
    CohScatter,
    /// A coherent scatter was sampled but coherent modeling is off: the
    /// interaction is undone.
    NoInteraction,
}

/// Outcome of applying the chosen action to the photon.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InteractionOutcome {
    /// The photon was absorbed here.
    Absorbed {
        /// Absorption forced because the post-scatter energy fell below the
        /// supported minimum.
        forced: bool,
    },
    /// The photon scattered and continues.
    Scattered,
    /// Nothing happened (disabled coherent); the caller redraws free paths.
    NoOp,
}

/// Decides, probabilistically, the photon's action in `material` at
/// `energy_kev`. Consumes exactly one uniform draw.
#[must_use]
pub fn decide_photon_action(
    xsections: &dyn CrossSection,
    material: usize,
    energy_kev: f64,
    modeling_coherent: bool,
    sampler: &mut dyn Sampler,
) -> PhotonAction {
    let p_scatter = xsections.p_scatter(material, energy_kev);
    let p_compton = xsections.p_compton_given_scatter(material, energy_kev);
    let u = sampler.uniform();

    if u > p_scatter {
        PhotonAction::Absorb
    } else if u <= p_scatter * p_compton {
        PhotonAction::ComptonScatter
    } else if modeling_coherent {
        PhotonAction::CohScatter
    } else {
        PhotonAction::NoInteraction
    }
}

/// Decides and applies one interaction: absorption zeroes the energy,
/// scatters invoke the kernels, and a post-scatter energy below the minimum
/// converts to a forced absorption.
pub fn perform_interaction(
    xsections: &dyn CrossSection,
    material: usize,
    photon: &mut Photon,
    modeling_coherent: bool,
    sampler: &mut dyn Sampler,
) -> InteractionOutcome {
    let action = decide_photon_action(
        xsections,
        material,
        photon.energy,
        modeling_coherent,
        sampler,
    );

    match action {
        PhotonAction::Absorb => {
            photon.energy = 0.0;
            InteractionOutcome::Absorbed { forced: false }
        }
        PhotonAction::ComptonScatter => {
            xsections.do_compton(photon, sampler);
            finish_scatter(photon)
        }
        PhotonAction::CohScatter => {
            xsections.do_coherent(photon, material, sampler);
            finish_scatter(photon)
        }
        PhotonAction::NoInteraction => InteractionOutcome::NoOp,
    }
}

fn finish_scatter(photon: &mut Photon) -> InteractionOutcome {
    if photon.energy < MIN_PHOTON_ENERGY {
        photon.energy = 0.0;
        InteractionOutcome::Absorbed { forced: true }
    } else {
        InteractionOutcome::Scattered
    }
}
