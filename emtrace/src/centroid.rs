//! Energy-weighted centroid of a photon's interactions, and the Gaussian
//! energy and time-of-flight blurs applied to detected photons.

use crate::consts::{GAUSS_FWHM_MAGIC, SPEED_OF_LIGHT};
use crate::photon::{Interaction, Photon, Position};
use crate::sampler::Sampler;

/// Energy-weighted centroid of the selected interactions; only active ones
/// contribute. Returns the centroid and the summed deposited energy.
#[must_use]
pub fn centroid_of<'a, I>(interactions: I) -> (Position, f64)
where
    I: IntoIterator<Item = &'a Interaction>,
{
    let mut centroid = Position::default();
    let mut deposited = 0.0;

    for interaction in interactions {
        if !interaction.is_active {
            continue;
        }
        let energy = interaction.energy_deposited;
        deposited += energy;
        centroid.x = interaction.position.x.mul_add(energy, centroid.x);
        centroid.y = interaction.position.y.mul_add(energy, centroid.y);
        centroid.z = interaction.position.z.mul_add(energy, centroid.z);
    }

    if deposited > 0.0 {
        centroid.x /= deposited;
        centroid.y /= deposited;
        centroid.z /= deposited;
    }

    (centroid, deposited)
}

/// Computes the centroid over the photon's whole interaction list and
/// records it as the detected location; the photon energy becomes the
/// deposited energy.
pub fn centroid_of_all(photon: &mut Photon) {
    let (centroid, deposited) = centroid_of(photon.interactions.iter());
    photon.detected_location = centroid;
    photon.energy = deposited;
}

/// Gaussian energy blur parameters.
#[derive(Clone, Copy, Debug)]
pub struct EnergyBlur {
    /// FWHM as a percentage at the reference energy.
    pub resolution_percentage: f64,
    /// Reference energy (keV).
    pub reference_energy_kev: f64,
}

impl EnergyBlur {
    /// Blurs an energy value; the FWHM scales with the square root of the
    /// energy relative to the reference energy.
    #[must_use]
    pub fn blur(&self, energy: f64, sampler: &mut dyn Sampler) -> f64 {
        let energy_prod = energy * self.reference_energy_kev;
        let std_dev = self.resolution_percentage * energy_prod.sqrt() / GAUSS_FWHM_MAGIC;
        sampler.gaussian(energy, std_dev)
    }
}

/// Gaussian time-of-flight blur, applied to the travel distance standing in
/// for arrival time.
#[derive(Clone, Copy, Debug)]
pub struct TimeBlur {
    /// Photon time FWHM (nanoseconds).
    pub fwhm_ns: f64,
}

impl TimeBlur {
    /// Blurs a travel distance (cm); the FWHM in nanoseconds is converted
    /// to a distance through the speed of light.
    #[must_use]
    pub fn blur(&self, travel_distance: f64, sampler: &mut dyn Sampler) -> f64 {
        let std_dev = self.fwhm_ns * 1.0e-9 * SPEED_OF_LIGHT / (GAUSS_FWHM_MAGIC / 100.0);
        sampler.gaussian(travel_distance, std_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photon::ElementIndex;
    use crate::sampler::SequenceSampler;
    use float_cmp::assert_approx_eq;

    fn interaction(x: f64, energy: f64, is_active: bool) -> Interaction {
        Interaction {
            position: Position::new(x, 0.0, 0.0),
            indices: ElementIndex::default(),
            energy_deposited: energy,
            is_active,
        }
    }

    #[test]
    fn centroid_weighs_by_deposited_energy() {
        let interactions = [
            interaction(0.0, 100.0, true),
            interaction(1.0, 300.0, true),
        ];
        let (centroid, deposited) = centroid_of(interactions.iter());
        assert_approx_eq!(f64, deposited, 400.0, ulps = 2);
        assert_approx_eq!(f64, centroid.x, 0.75, ulps = 2);
    }

    #[test]
    fn inactive_interactions_do_not_contribute() {
        let interactions = [
            interaction(0.0, 100.0, true),
            interaction(5.0, 500.0, false),
        ];
        let (centroid, deposited) = centroid_of(interactions.iter());
        assert_approx_eq!(f64, deposited, 100.0, ulps = 2);
        assert_approx_eq!(f64, centroid.x, 0.0, ulps = 2);
    }

    #[test]
    fn energy_blur_sigma_follows_the_magic_constant() {
        let blur = EnergyBlur {
            resolution_percentage: 10.0,
            reference_energy_kev: 511.0,
        };
        // draws chosen so the Gaussian lands one sigma above the mean
        let one_sigma = 1.0 - (-0.5_f64).exp();
        let mut sampler = SequenceSampler::new(vec![one_sigma, 0.0]);
        let expected_sigma = 10.0 * (511.0_f64 * 511.0).sqrt() / GAUSS_FWHM_MAGIC;
        let blurred = blur.blur(511.0, &mut sampler);
        assert_approx_eq!(f64, blurred, 511.0 + expected_sigma, epsilon = 1e-9);
    }

    #[test]
    fn zero_fwhm_time_blur_is_identity() {
        let blur = TimeBlur { fwhm_ns: 0.0 };
        let mut sampler = SequenceSampler::new(vec![0.3, 0.8]);
        assert_approx_eq!(f64, blur.blur(123.4, &mut sampler), 123.4, ulps = 2);
    }
}
