//! Parameter deck: the deserialized form of a simulation configuration and
//! its cross-field validation.
//!
//! Geometric consistency of block placements (overlap, bound violations) is
//! checked later when the block database is built; this module catches
//! everything that can be judged from the deck alone.

use crate::error::{Error, Result};
use crate::xsection::MaterialData;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether the run simulates coincidence (PET) or single-photon (SPECT)
/// imaging.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Positron emission tomography (photon pairs).
    Pet,
    /// Single-photon emission computed tomography.
    Spect,
}

/// Recognized detector types.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorType {
    /// Energy/time blur only, PET flavor.
    SimplePet,
    /// Energy/time blur only, SPECT flavor.
    SimpleSpect,
    /// UNC SPECT detector (legacy; not supported by this core).
    UncSpect,
    /// Polygonal detector (legacy; not supported by this core).
    Polygonal,
    /// Single planar head.
    Planar,
    /// Concentric cylindrical rings.
    Cylindrical,
    /// Two opposed planar heads in coincidence.
    DualHeaded,
    /// Rings of rotated rectangular blocks.
    Block,
}

/// How a block detector reports the detected position.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionAlgorithm {
    /// Snap the energy-weighted centroid to the nearest active element
    /// center.
    #[default]
    SnapCentroidToCrystalCenter,
    /// Report the energy-weighted centroid itself.
    UseEnergyWeightedCentroid,
}

/// How triple coincidences are handled downstream.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriplesMethod {
    /// Drop all members of a triple.
    #[default]
    DeleteAll,
    /// Keep the pair with the highest energies.
    KeepHighestPair,
}

fn default_true() -> bool {
    true
}

/// Simulation-wide controls.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationParams {
    /// PET or SPECT.
    pub mode: ScanMode,
    /// Random seed for the run.
    pub seed: u64,
    /// Number of decays to simulate.
    pub num_decays: u64,
    /// Model coherent scatter in the detector.
    #[serde(default = "default_true")]
    pub model_coherent_scatter: bool,
}

/// A simple emission model for driving the core from the command line:
/// isotropic photons from a fixed point.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmissionParams {
    /// Photon energy at emission (keV); 511 for PET.
    pub energy_kev: f64,
    /// Emission point in tomograph coordinates (cm).
    #[serde(default)]
    pub position: [f64; 3],
}

/// One layer of a planar (or dual-headed) detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlanarLayerParams {
    /// Material index into the deck's material list.
    pub material: usize,
    /// Layer depth along the detector x-axis (cm).
    pub depth: f64,
    /// Whether deposits here contribute to the centroid.
    pub is_active: bool,
}

/// Planar / dual-headed detector description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlanarParams {
    /// Layers from the inner face outward.
    pub layers: Vec<PlanarLayerParams>,
    /// Distance from tomograph axis to the inner face (cm).
    pub inner_radius: f64,
    /// Axial extent (cm), centered on z = 0.
    pub axial_length: f64,
    /// Transaxial extent (cm), centered on the head axis.
    pub transaxial_length: f64,
    /// Number of discrete views; `0` samples a random angle per decay, `-1`
    /// rotates continuously.
    pub num_views: i64,
    /// Minimum view angle (degrees).
    pub min_angle_deg: f64,
    /// Maximum view angle (degrees).
    pub max_angle_deg: f64,
}

/// One radial layer of a cylindrical-detector ring.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CylLayerParams {
    /// Material index into the deck's material list.
    pub material: usize,
    /// Inner radius (cm).
    pub inner_radius: f64,
    /// Outer radius (cm).
    pub outer_radius: f64,
    /// Whether deposits here contribute to the centroid.
    pub is_active: bool,
}

/// One axial ring of a cylindrical detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CylRingParams {
    /// Lower axial bound (cm).
    pub min_z: f64,
    /// Upper axial bound (cm).
    pub max_z: f64,
    /// Material filling axial gaps adjacent to this ring.
    #[serde(default)]
    pub gap_material: Option<usize>,
    /// Radial layers from the inside out.
    pub layers: Vec<CylLayerParams>,
}

/// Cylindrical detector description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CylindricalParams {
    /// Rings in ascending axial order.
    pub rings: Vec<CylRingParams>,
}

/// One element of a block layer grid.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BlockElementParams {
    /// Material index into the deck's material list.
    pub material: usize,
    /// Whether deposits here contribute to the centroid.
    pub is_active: bool,
}

/// One x-layer of a block, subdivided in y and z.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockLayerParams {
    /// Lesser x face of the layer in block coordinates (cm).
    pub inner_x: f64,
    /// Greater x face of the layer in block coordinates (cm).
    pub outer_x: f64,
    /// Ascending partition values splitting the layer in y.
    #[serde(default)]
    pub y_changes: Vec<f64>,
    /// Ascending partition values splitting the layer in z.
    #[serde(default)]
    pub z_changes: Vec<f64>,
    /// Elements in y-major order; `(y_changes + 1) * (z_changes + 1)`
    /// entries.
    pub elements: Vec<BlockElementParams>,
}

/// The shared shape of a block: reference point, bounding box, layer grid.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockShapeParams {
    /// Reference point in block coordinates (cm).
    pub reference: [f64; 3],
    /// Local bounding box `[x_min, x_max]` (cm).
    pub x_bounds: [f64; 2],
    /// Local bounding box `[y_min, y_max]` (cm).
    pub y_bounds: [f64; 2],
    /// Local bounding box `[z_min, z_max]` (cm).
    pub z_bounds: [f64; 2],
    /// Layers in ascending x order.
    pub layers: Vec<BlockLayerParams>,
}

/// Placement of one block within a ring.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockPlacementParams {
    /// Radial position of the block reference point (cm).
    pub radial_position: f64,
    /// Angular position (degrees).
    pub angular_position_deg: f64,
    /// Axial position in ring coordinates (cm).
    pub z_position: f64,
    /// Transaxial orientation of the block face (degrees).
    pub transaxial_orientation_deg: f64,
    /// The block's shape.
    pub shape: BlockShapeParams,
}

/// One ring of a block detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockRingParams {
    /// Inner bound along x (cm); rings may be elliptical.
    pub x_inner_radius: f64,
    /// Inner bound along y (cm).
    pub y_inner_radius: f64,
    /// Outer bound along x (cm).
    pub x_outer_radius: f64,
    /// Outer bound along y (cm).
    pub y_outer_radius: f64,
    /// Lower axial bound of the ring (cm).
    pub min_z: f64,
    /// Upper axial bound of the ring (cm).
    pub max_z: f64,
    /// Axial shift applied to the whole ring (cm).
    #[serde(default)]
    pub axial_shift: f64,
    /// Rotation applied to the whole ring (degrees).
    #[serde(default)]
    pub transaxial_rotation_deg: f64,
    /// Blocks in this ring.
    pub blocks: Vec<BlockPlacementParams>,
}

/// Block detector description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockTomoParams {
    /// How the detected position is reported.
    #[serde(default)]
    pub position_algorithm: PositionAlgorithm,
    /// Rings in ascending axial order.
    pub rings: Vec<BlockRingParams>,
}

/// Detector-wide options plus the shape-specific description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DetectorParams {
    /// Which detector to simulate.
    pub detector_type: DetectorType,
    /// Time-of-flight blur FWHM in nanoseconds (PET only; 0 disables).
    #[serde(default)]
    pub photon_time_fwhm_ns: f64,
    /// Energy resolution FWHM as a percentage at the reference energy.
    #[serde(default)]
    pub energy_resolution_percentage: Option<f64>,
    /// Reference energy for the energy resolution (keV).
    #[serde(alias = "reference_energy_keV", default)]
    pub reference_energy_kev: Option<f64>,
    /// Force the first interaction, rescaling the photon weight.
    #[serde(default)]
    pub do_forced_interaction: bool,
    /// History file to write detections to.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// History file for randoms processing.
    #[serde(default)]
    pub randoms_history_file: Option<PathBuf>,
    /// Coincidence timing window in nanoseconds.
    #[serde(default)]
    pub coincidence_timing_window_ns: Option<f64>,
    /// How triple coincidences are resolved.
    #[serde(default)]
    pub triples_processing_method: Option<TriplesMethod>,
    /// Outer radius of the collimator cylinder bounding the detector from
    /// the inside (cm); the inner forbidden zone for block detectors.
    #[serde(default)]
    pub collimator_outer_radius: Option<f64>,
    /// Planar / dual-headed description.
    #[serde(default)]
    pub planar: Option<PlanarParams>,
    /// Cylindrical description.
    #[serde(default)]
    pub cylindrical: Option<CylindricalParams>,
    /// Block description.
    #[serde(default)]
    pub block: Option<BlockTomoParams>,
}

/// A full parameter deck.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Deck {
    /// Simulation-wide controls.
    pub simulation: SimulationParams,
    /// Emission model for the front end.
    pub emission: EmissionParams,
    /// Materials referenced by index from the detector description.
    pub materials: Vec<MaterialData>,
    /// The detector.
    pub detector: DetectorParams,
}

fn config_err<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Config(message.into()))
}

impl Deck {
    /// Validates everything that can be judged from the deck alone.
    ///
    /// # Errors
    ///
    /// Returns a configuration error with a single human-readable line for
    /// the first problem found.
    pub fn validate(&self) -> Result<()> {
        let det = &self.detector;
        let is_pet = self.simulation.mode == ScanMode::Pet;

        match det.detector_type {
            DetectorType::UncSpect | DetectorType::Polygonal => {
                return config_err(format!(
                    "detector_type {:?} is not supported by this simulator",
                    det.detector_type
                ));
            }
            DetectorType::SimplePet | DetectorType::DualHeaded | DetectorType::Block
                if !is_pet =>
            {
                return config_err("this detector type requires PET mode");
            }
            DetectorType::SimpleSpect | DetectorType::Planar if is_pet => {
                return config_err("this detector type requires SPECT mode");
            }
            _ => {}
        }

        if det.photon_time_fwhm_ns < 0.0 {
            return config_err("photon_time_fwhm_ns must be non-negative");
        }
        if det.photon_time_fwhm_ns > 0.0 && !is_pet {
            return config_err("photon_time_fwhm_ns is a PET-only option");
        }

        if let Some(pct) = det.energy_resolution_percentage {
            if !(0.0..=50.0).contains(&pct) {
                return config_err("energy_resolution_percentage must lie in [0, 50]");
            }
            if det.reference_energy_kev.is_none() {
                return config_err(
                    "reference_energy_keV must be set when an energy resolution is given",
                );
            }
        }
        if let Some(reference) = det.reference_energy_kev {
            if reference <= 0.0 {
                return config_err("reference_energy_keV must be positive");
            }
        }

        match det.detector_type {
            DetectorType::Planar | DetectorType::DualHeaded => {
                let Some(planar) = &det.planar else {
                    return config_err("planar detector description missing");
                };
                self.validate_planar(planar, is_pet)?;
            }
            DetectorType::Cylindrical => {
                let Some(cylindrical) = &det.cylindrical else {
                    return config_err("cylindrical detector description missing");
                };
                self.validate_cylindrical(cylindrical)?;
            }
            DetectorType::Block => {
                let Some(block) = &det.block else {
                    return config_err("block detector description missing");
                };
                self.validate_block(block)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn check_material(&self, material: usize, what: &str) -> Result<()> {
        if material >= self.materials.len() {
            return config_err(format!(
                "{what} references material {material}, but only {} are defined",
                self.materials.len()
            ));
        }
        Ok(())
    }

    fn validate_planar(&self, planar: &PlanarParams, is_pet: bool) -> Result<()> {
        if planar.layers.is_empty() {
            return config_err("planar detector needs at least one layer");
        }
        for (i, layer) in planar.layers.iter().enumerate() {
            self.check_material(layer.material, &format!("planar layer {i}"))?;
            if layer.depth <= 0.0 {
                return config_err(format!("planar layer {i} has non-positive depth"));
            }
        }
        if planar.inner_radius < 0.0 {
            return config_err("plnr_inner_radius must be non-negative");
        }
        if planar.axial_length <= 0.0 || planar.transaxial_length <= 0.0 {
            return config_err("planar detector extents must be positive");
        }
        if planar.num_views < -1 {
            return config_err("plnr_num_views must be -1, 0, or positive");
        }

        let (min, max) = (planar.min_angle_deg, planar.max_angle_deg);
        if min >= max {
            return config_err("plnr_min_angle must be smaller than plnr_max_angle");
        }
        if is_pet && (max - min) > 180.0 {
            return config_err("PET planar angle range must not exceed 180 degrees");
        }
        if planar.num_views == -1 {
            let expected = if is_pet { 180.0 } else { 360.0 };
            if min != 0.0 || max != expected {
                return config_err(format!(
                    "continuous rotation requires the angle range [0, {expected}]"
                ));
            }
        }
        Ok(())
    }

    fn validate_cylindrical(&self, cylindrical: &CylindricalParams) -> Result<()> {
        if cylindrical.rings.is_empty() {
            return config_err("cylindrical detector needs at least one ring");
        }
        let mut prev_max = f64::NEG_INFINITY;
        for (r, ring) in cylindrical.rings.iter().enumerate() {
            if ring.min_z >= ring.max_z {
                return config_err(format!("ring {r} has cyln_min_z >= cyln_max_z"));
            }
            if ring.min_z < prev_max {
                return config_err(format!("ring {r} overlaps the previous ring axially"));
            }
            prev_max = ring.max_z;

            if ring.layers.is_empty() {
                return config_err(format!("ring {r} needs at least one layer"));
            }
            let mut prev_outer = 0.0_f64;
            for (l, layer) in ring.layers.iter().enumerate() {
                self.check_material(layer.material, &format!("ring {r} layer {l}"))?;
                if layer.inner_radius >= layer.outer_radius {
                    return config_err(format!(
                        "ring {r} layer {l} has inner_radius >= outer_radius"
                    ));
                }
                if l > 0 && (layer.inner_radius - prev_outer).abs() > 1e-9 {
                    return config_err(format!(
                        "ring {r} layer {l} does not start at the previous outer radius"
                    ));
                }
                prev_outer = layer.outer_radius;
            }
            if let Some(gap) = ring.gap_material {
                self.check_material(gap, &format!("ring {r} gap"))?;
            }
        }
        Ok(())
    }

    fn validate_block(&self, block: &BlockTomoParams) -> Result<()> {
        if block.rings.is_empty() {
            return config_err("block detector needs at least one ring");
        }
        let mut prev_max = f64::NEG_INFINITY;
        for (r, ring) in block.rings.iter().enumerate() {
            if ring.min_z >= ring.max_z {
                return config_err(format!("block ring {r} has min_z >= max_z"));
            }
            let shifted_min = ring.min_z + ring.axial_shift;
            if shifted_min < prev_max {
                return config_err(format!(
                    "block ring {r} axial range is out of order with the previous ring"
                ));
            }
            prev_max = ring.max_z + ring.axial_shift;

            if ring.blocks.is_empty() {
                return config_err(format!("block ring {r} has no blocks"));
            }
            for (b, placement) in ring.blocks.iter().enumerate() {
                let shape = &placement.shape;
                if shape.layers.is_empty() {
                    return config_err(format!("ring {r} block {b} has no layers"));
                }
                for (l, layer) in shape.layers.iter().enumerate() {
                    if layer.inner_x >= layer.outer_x {
                        return config_err(format!(
                            "ring {r} block {b} layer {l} has inner_x >= outer_x"
                        ));
                    }
                    let expected =
                        (layer.y_changes.len() + 1) * (layer.z_changes.len() + 1);
                    if layer.elements.len() != expected {
                        return config_err(format!(
                            "ring {r} block {b} layer {l} has {} elements, expected {expected}",
                            layer.elements.len()
                        ));
                    }
                    if !layer.y_changes.windows(2).all(|w| w[0] < w[1])
                        || !layer.z_changes.windows(2).all(|w| w[0] < w[1])
                    {
                        return config_err(format!(
                            "ring {r} block {b} layer {l} partition values must ascend"
                        ));
                    }
                    for (e, element) in layer.elements.iter().enumerate() {
                        self.check_material(
                            element.material,
                            &format!("ring {r} block {b} layer {l} element {e}"),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The energy-blur settings, if enabled.
    #[must_use]
    pub fn energy_blur(&self) -> Option<(f64, f64)> {
        match (
            self.detector.energy_resolution_percentage,
            self.detector.reference_energy_kev,
        ) {
            (Some(pct), Some(reference)) if pct > 0.0 => Some((pct, reference)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_deck(detector_type: DetectorType, mode: ScanMode) -> Deck {
        Deck {
            simulation: SimulationParams {
                mode,
                seed: 1,
                num_decays: 10,
                model_coherent_scatter: true,
            },
            emission: EmissionParams {
                energy_kev: 511.0,
                position: [0.0; 3],
            },
            materials: vec![MaterialData::uniform("bgo", 0.95, 0.4, 0.95)],
            detector: DetectorParams {
                detector_type,
                photon_time_fwhm_ns: 0.0,
                energy_resolution_percentage: None,
                reference_energy_kev: None,
                do_forced_interaction: false,
                history_file: None,
                randoms_history_file: None,
                coincidence_timing_window_ns: None,
                triples_processing_method: None,
                collimator_outer_radius: None,
                planar: None,
                cylindrical: None,
                block: None,
            },
        }
    }

    fn one_ring_cylinder() -> CylindricalParams {
        CylindricalParams {
            rings: vec![CylRingParams {
                min_z: -10.0,
                max_z: 10.0,
                gap_material: None,
                layers: vec![CylLayerParams {
                    material: 0,
                    inner_radius: 40.0,
                    outer_radius: 43.0,
                    is_active: true,
                }],
            }],
        }
    }

    #[test]
    fn simple_pet_deck_validates() {
        let deck = minimal_deck(DetectorType::SimplePet, ScanMode::Pet);
        assert!(deck.validate().is_ok());
    }

    #[test]
    fn unc_spect_is_rejected() {
        let deck = minimal_deck(DetectorType::UncSpect, ScanMode::Spect);
        assert!(deck.validate().is_err());
    }

    #[test]
    fn resolution_requires_reference_energy() {
        let mut deck = minimal_deck(DetectorType::SimplePet, ScanMode::Pet);
        deck.detector.energy_resolution_percentage = Some(12.0);
        assert!(deck.validate().is_err());
        deck.detector.reference_energy_kev = Some(511.0);
        assert!(deck.validate().is_ok());
        deck.detector.energy_resolution_percentage = Some(70.0);
        assert!(deck.validate().is_err());
    }

    #[test]
    fn tof_blur_is_pet_only() {
        let mut deck = minimal_deck(DetectorType::SimpleSpect, ScanMode::Spect);
        deck.detector.photon_time_fwhm_ns = 0.3;
        assert!(deck.validate().is_err());
    }

    #[test]
    fn cylindrical_ring_order_is_enforced() {
        let mut deck = minimal_deck(DetectorType::Cylindrical, ScanMode::Pet);
        let mut cyl = one_ring_cylinder();
        cyl.rings.push(CylRingParams {
            min_z: -30.0,
            max_z: -11.0,
            gap_material: None,
            layers: cyl.rings[0].layers.clone(),
        });
        deck.detector.cylindrical = Some(cyl);
        assert!(deck.validate().is_err());
    }

    #[test]
    fn cylindrical_deck_validates() {
        let mut deck = minimal_deck(DetectorType::Cylindrical, ScanMode::Pet);
        deck.detector.cylindrical = Some(one_ring_cylinder());
        assert!(deck.validate().is_ok());
    }

    #[test]
    fn planar_pet_mode_mismatch() {
        let deck = minimal_deck(DetectorType::Planar, ScanMode::Pet);
        assert!(deck.validate().is_err());
    }

    #[test]
    fn block_element_count_must_match_grid() {
        let mut deck = minimal_deck(DetectorType::Block, ScanMode::Pet);
        deck.detector.block = Some(BlockTomoParams {
            position_algorithm: PositionAlgorithm::default(),
            rings: vec![BlockRingParams {
                x_inner_radius: 30.0,
                y_inner_radius: 30.0,
                x_outer_radius: 50.0,
                y_outer_radius: 50.0,
                min_z: -5.0,
                max_z: 5.0,
                axial_shift: 0.0,
                transaxial_rotation_deg: 0.0,
                blocks: vec![BlockPlacementParams {
                    radial_position: 40.0,
                    angular_position_deg: 0.0,
                    z_position: 0.0,
                    transaxial_orientation_deg: 0.0,
                    shape: BlockShapeParams {
                        reference: [0.0; 3],
                        x_bounds: [0.0, 2.0],
                        y_bounds: [-2.0, 2.0],
                        z_bounds: [-2.0, 2.0],
                        layers: vec![BlockLayerParams {
                            inner_x: 0.0,
                            outer_x: 2.0,
                            y_changes: vec![0.0],
                            z_changes: vec![],
                            elements: vec![BlockElementParams {
                                material: 0,
                                is_active: true,
                            }],
                        }],
                    },
                }],
            }],
        });
        // one element supplied, grid wants two
        assert!(deck.validate().is_err());
    }
}
