//! The `Detector` trait shared by every detector shape, and the enum that
//! dispatches over the concrete shapes.

use crate::block_detector::BlockDetector;
use crate::cylinder_detector::CylindricalDetector;
use crate::photon::{ElementIndex, Photon};
use crate::planar_detector::PlanarDetector;
use crate::sampler::Sampler;
use crate::simple_detector::SimpleDetector;
use crate::xsection::CrossSection;
use enum_dispatch::enum_dispatch;

/// Result of advancing a photon by one tracking step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrackAction {
    /// The free paths ran out inside a volume: the photon interacts here.
    Interact {
        /// Material at the interaction point.
        material: usize,
        /// Whether the volume is active.
        is_active: bool,
    },
    /// Crossed into an adjacent layer or block; tracking continues.
    LayerCross,
    /// Crossed an axial ring boundary; tracking continues.
    AxialCross,
    /// Left the detector; the photon is discarded.
    Discard,
}

impl TrackAction {
    /// Whether tracking continues after this action.
    #[must_use]
    pub const fn continues(&self) -> bool {
        matches!(self, Self::LayerCross | Self::AxialCross)
    }
}

/// The operations every detector shape provides to the per-photon driver.
#[enum_dispatch]
pub trait Detector {
    /// Prepares per-photon state; shapes with sampled view angles draw one
    /// angle per decay.
    fn init_photon(&mut self, decay_id: u64, photon: &mut Photon, sampler: &mut dyn Sampler);

    /// Places the photon on the inner detector surface. `false` rejects the
    /// photon (it misses the detector).
    fn project_to_detector(&mut self, photon: &mut Photon) -> bool;

    /// Total optical path to exit the detector along the photon's current
    /// ray, without consuming anything.
    fn free_paths_to_exit(&mut self, photon: &Photon, xsections: &dyn CrossSection) -> f64;

    /// Advances the photon to its next event, decrementing `fp_to_go` by
    /// the free paths consumed on the segment.
    fn find_next_interaction(
        &mut self,
        photon: &mut Photon,
        fp_to_go: &mut f64,
        xsections: &dyn CrossSection,
    ) -> TrackAction;

    /// The hierarchy indices of the volume the photon currently occupies,
    /// recorded with each interaction.
    fn current_indices(&self) -> ElementIndex;

    /// Computes the detected position (and energy) from the photon's
    /// interaction list, leaving it in `photon.detected_location`.
    fn find_detected_position(&mut self, photon: &mut Photon);

    /// Converts the detected position into tomograph coordinates and
    /// finalizes the photon location.
    fn end_detection(&self, photon: &mut Photon);

    /// Inner radius of the detector, for binners.
    fn inner_radius(&self) -> f64;

    /// Outer radius of the detector, for binners.
    fn outer_radius(&self) -> f64;
}

/// Enum which lists all detector shape variants.
#[enum_dispatch(Detector)]
pub enum DetectorEnum {
    /// Blur-only detector.
    SimpleDetector,
    /// Planar single head or dual heads.
    PlanarDetector,
    /// Concentric cylindrical rings.
    CylindricalDetector,
    /// Rings of rotated rectangular blocks.
    BlockDetector,
}
