//! Cross-section service: energy-dependent attenuation, scatter branching
//! ratios, and the Compton/coherent scatter kernels.
//!
//! The detector core only sees the [`CrossSection`] trait; [`XsecTables`]
//! implements it by resampling per-material knot data onto one shared
//! logarithmic energy grid at load time, so lookups during tracking are a
//! single index computation.

use crate::error::{Error, Result};
use crate::photon::{Direction, Photon};
use crate::sampler::Sampler;
use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Electron rest mass (keV), the Compton energy scale.
pub const ELECTRON_REST_MASS_KEV: f64 = 511.0;

/// Energy-dependent material data consumed by the detector core.
pub trait CrossSection {
    /// Linear attenuation coefficient (1/cm).
    fn attenuation(&self, material: usize, energy_kev: f64) -> f64;

    /// Probability that an interaction is a scatter (rather than an
    /// absorption).
    fn p_scatter(&self, material: usize, energy_kev: f64) -> f64;

    /// Probability that a scatter is Compton (rather than coherent).
    fn p_compton_given_scatter(&self, material: usize, energy_kev: f64) -> f64;

    /// Compton-scatters the photon: updates direction and reduces energy.
    fn do_compton(&self, photon: &mut Photon, sampler: &mut dyn Sampler);

    /// Coherent-scatters the photon: updates direction, energy unchanged.
    fn do_coherent(&self, photon: &mut Photon, material: usize, sampler: &mut dyn Sampler);
}

/// Per-material cross-section knots as they appear in a parameter deck.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MaterialData {
    /// Human-readable material name.
    pub name: String,
    /// Energy knots (keV), strictly ascending.
    pub energies: Vec<f64>,
    /// Linear attenuation (1/cm) at each knot.
    pub attenuation: Vec<f64>,
    /// Scatter probability at each knot.
    pub prob_scatter: Vec<f64>,
    /// Compton share of scatter at each knot.
    pub prob_compton_given_scatter: Vec<f64>,
}

impl MaterialData {
    /// A material with energy-independent properties, mostly useful in
    /// tests and synthetic decks.
    #[must_use]
    pub fn uniform(name: &str, attenuation: f64, p_scatter: f64, p_compton: f64) -> Self {
        Self {
            name: name.to_string(),
            energies: vec![1.0, 1000.0],
            attenuation: vec![attenuation; 2],
            prob_scatter: vec![p_scatter; 2],
            prob_compton_given_scatter: vec![p_compton; 2],
        }
    }
}

/// Number of grid points the knot data is resampled onto.
const GRID_POINTS: usize = 128;

/// Cross-section tables over a shared logarithmic energy grid.
pub struct XsecTables {
    /// Material names, indexed by material id.
    names: Vec<String>,
    /// `ln` of the lowest grid energy.
    ln_e_min: f64,
    /// Grid spacing in `ln` energy.
    ln_step: f64,
    /// `ln` attenuation per (material, grid point).
    ln_atten: Array2<f64>,
    /// Scatter probability per (material, grid point).
    p_scat: Array2<f64>,
    /// Compton share per (material, grid point).
    p_compt: Array2<f64>,
}

impl XsecTables {
    /// Builds the shared-grid tables from per-material knot data.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty input, mismatched knot list
    /// lengths, non-ascending energies, or non-positive attenuation values.
    pub fn new(materials: &[MaterialData]) -> Result<Self> {
        if materials.is_empty() {
            return Err(Error::Config("no materials defined".into()));
        }

        for mat in materials {
            let n = mat.energies.len();
            if n < 2 {
                return Err(Error::Config(format!(
                    "material '{}' needs at least two energy knots",
                    mat.name
                )));
            }
            if mat.attenuation.len() != n
                || mat.prob_scatter.len() != n
                || mat.prob_compton_given_scatter.len() != n
            {
                return Err(Error::Config(format!(
                    "material '{}' has mismatched knot list lengths",
                    mat.name
                )));
            }
            if !mat.energies.iter().tuple_windows().all(|(a, b)| a < b) {
                return Err(Error::Config(format!(
                    "material '{}' energies must be strictly ascending",
                    mat.name
                )));
            }
            if mat.attenuation.iter().any(|&mu| mu <= 0.0) {
                return Err(Error::Config(format!(
                    "material '{}' has non-positive attenuation",
                    mat.name
                )));
            }
            for p in mat
                .prob_scatter
                .iter()
                .chain(&mat.prob_compton_given_scatter)
            {
                if !(0.0..=1.0).contains(p) {
                    return Err(Error::Config(format!(
                        "material '{}' has a probability outside [0, 1]",
                        mat.name
                    )));
                }
            }
        }

        let e_min = materials
            .iter()
            .map(|m| m.energies[0])
            .fold(f64::INFINITY, f64::min);
        let e_max = materials
            .iter()
            .map(|m| *m.energies.last().unwrap())
            .fold(0.0_f64, f64::max);

        let ln_e_min = e_min.ln();
        let ln_step = (e_max.ln() - ln_e_min) / ((GRID_POINTS - 1) as f64);

        let num = materials.len();
        let mut ln_atten = Array2::zeros((num, GRID_POINTS));
        let mut p_scat = Array2::zeros((num, GRID_POINTS));
        let mut p_compt = Array2::zeros((num, GRID_POINTS));

        for (m, mat) in materials.iter().enumerate() {
            for i in 0..GRID_POINTS {
                let energy = ((i as f64).mul_add(ln_step, ln_e_min)).exp();
                ln_atten[[m, i]] = interp_knots(&mat.energies, &mat.attenuation, energy).ln();
                p_scat[[m, i]] = interp_knots(&mat.energies, &mat.prob_scatter, energy);
                p_compt[[m, i]] =
                    interp_knots(&mat.energies, &mat.prob_compton_given_scatter, energy);
            }
        }

        Ok(Self {
            names: materials.iter().map(|m| m.name.clone()).collect(),
            ln_e_min,
            ln_step,
            ln_atten,
            p_scat,
            p_compt,
        })
    }

    /// Number of materials in the tables.
    #[must_use]
    pub fn num_materials(&self) -> usize {
        self.names.len()
    }

    /// Name of the given material.
    #[must_use]
    pub fn material_name(&self, material: usize) -> &str {
        &self.names[material]
    }

    /// Fractional grid coordinate of `energy_kev`, clamped to the grid.
    fn grid_pos(&self, energy_kev: f64) -> (usize, f64) {
        let t = (energy_kev.max(1e-6).ln() - self.ln_e_min) / self.ln_step;
        let t = t.clamp(0.0, (GRID_POINTS - 1) as f64);
        let i = (t as usize).min(GRID_POINTS - 2);
        (i, t - i as f64)
    }

    fn lookup(&self, table: &Array2<f64>, material: usize, energy_kev: f64) -> f64 {
        let (i, frac) = self.grid_pos(energy_kev);
        (table[[material, i + 1]] - table[[material, i]]).mul_add(frac, table[[material, i]])
    }
}

/// Linear interpolation over ascending knots, clamped at the ends.
fn interp_knots(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }
    let i = xs.partition_point(|&knot| knot < x) - 1;
    let frac = (x - xs[i]) / (xs[i + 1] - xs[i]);
    (ys[i + 1] - ys[i]).mul_add(frac, ys[i])
}

impl CrossSection for XsecTables {
    fn attenuation(&self, material: usize, energy_kev: f64) -> f64 {
        self.lookup(&self.ln_atten, material, energy_kev).exp()
    }

    fn p_scatter(&self, material: usize, energy_kev: f64) -> f64 {
        self.lookup(&self.p_scat, material, energy_kev)
    }

    fn p_compton_given_scatter(&self, material: usize, energy_kev: f64) -> f64 {
        self.lookup(&self.p_compt, material, energy_kev)
    }

    fn do_compton(&self, photon: &mut Photon, sampler: &mut dyn Sampler) {
        let (cos_theta, energy_ratio) = sample_klein_nishina(photon.energy, sampler);
        let phi = std::f64::consts::TAU * sampler.uniform();
        photon.direction = rotate_direction(photon.direction, cos_theta, phi);
        photon.energy /= energy_ratio;
    }

    fn do_coherent(&self, photon: &mut Photon, _material: usize, sampler: &mut dyn Sampler) {
        let cos_theta = sample_thomson(sampler);
        let phi = std::f64::consts::TAU * sampler.uniform();
        photon.direction = rotate_direction(photon.direction, cos_theta, phi);
    }
}

/// Samples the Klein-Nishina distribution by Kahn's rejection method.
///
/// Returns `(cos_theta, eta)` where `eta = E/E'` is the energy ratio.
fn sample_klein_nishina(energy_kev: f64, sampler: &mut dyn Sampler) -> (f64, f64) {
    let alpha = energy_kev / ELECTRON_REST_MASS_KEV;
    let branch_cut = 2.0_f64.mul_add(alpha, 1.0) / 2.0_f64.mul_add(alpha, 9.0);

    loop {
        let r1 = sampler.uniform();
        let r2 = sampler.uniform();
        let r3 = sampler.uniform();

        if r1 <= branch_cut {
            let eta = 2.0 * alpha * r2 + 1.0;
            if r3 <= 4.0 * (1.0 / eta - 1.0 / (eta * eta)) {
                let cos_theta = 1.0 - (eta - 1.0) / alpha;
                return (cos_theta, eta);
            }
        } else {
            let eta = 2.0_f64.mul_add(alpha, 1.0) / 2.0_f64.mul_add(alpha * r2, 1.0);
            let cos_theta = 1.0 - (eta - 1.0) / alpha;
            if r3 <= 0.5 * cos_theta.mul_add(cos_theta, 1.0 / eta) {
                return (cos_theta, eta);
            }
        }
    }
}

/// Samples `cos(theta)` from the Thomson angular distribution
/// `(1 + cos^2) / 2` by rejection; the coherent kernel without form-factor
/// data.
fn sample_thomson(sampler: &mut dyn Sampler) -> f64 {
    loop {
        let cos_theta = 2.0_f64.mul_add(sampler.uniform(), -1.0);
        if sampler.uniform() <= 0.5 * cos_theta.mul_add(cos_theta, 1.0) {
            return cos_theta;
        }
    }
}

/// Rotates a unit direction by the polar scattering angle `theta` (given as
/// its cosine) and azimuth `phi` about the incident direction.
#[must_use]
pub fn rotate_direction(dir: Direction, cos_theta: f64, phi: f64) -> Direction {
    let sin_theta = cos_theta.mul_add(-cos_theta, 1.0).max(0.0).sqrt();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let sin_z = dir.sin_z();

    if sin_z < 1e-10 {
        // incident direction is (anti)parallel to z
        Direction::new(
            sin_theta * cos_phi,
            sin_theta * sin_phi,
            cos_theta.copysign(dir.cz),
        )
    } else {
        Direction::new(
            dir.cx.mul_add(
                cos_theta,
                sin_theta * (dir.cx * dir.cz).mul_add(cos_phi, -(dir.cy * sin_phi)) / sin_z,
            ),
            dir.cy.mul_add(
                cos_theta,
                sin_theta * (dir.cy * dir.cz).mul_add(cos_phi, dir.cx * sin_phi) / sin_z,
            ),
            dir.cz.mul_add(cos_theta, -(sin_z * sin_theta * cos_phi)),
        )
    }
}
