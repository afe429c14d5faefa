//! The "simple" detector: no transport at all. Photons are accepted where
//! they are, with the configured energy and time blurs applied by the
//! driver.

use crate::detector::{Detector, TrackAction};
use crate::photon::{ElementIndex, Photon};
use crate::sampler::Sampler;
use crate::xsection::CrossSection;

/// Blur-only detector for `simple_pet` / `simple_spect`.
pub struct SimpleDetector {
    /// Nominal detector radius reported to binners; simple detectors do not
    /// extend beyond the collimator.
    radius: f64,
}

impl SimpleDetector {
    /// Creates the detector with the collimator's outer radius.
    #[must_use]
    pub const fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl Detector for SimpleDetector {
    fn init_photon(&mut self, _decay_id: u64, _photon: &mut Photon, _sampler: &mut dyn Sampler) {}

    fn project_to_detector(&mut self, _photon: &mut Photon) -> bool {
        true
    }

    fn free_paths_to_exit(&mut self, _photon: &Photon, _xsections: &dyn CrossSection) -> f64 {
        0.0
    }

    fn find_next_interaction(
        &mut self,
        _photon: &mut Photon,
        _fp_to_go: &mut f64,
        _xsections: &dyn CrossSection,
    ) -> TrackAction {
        // the driver accepts simple-detector photons without tracking
        TrackAction::Discard
    }

    fn current_indices(&self) -> ElementIndex {
        ElementIndex::default()
    }

    fn find_detected_position(&mut self, photon: &mut Photon) {
        photon.detected_location = photon.location;
    }

    fn end_detection(&self, _photon: &mut Photon) {}

    fn inner_radius(&self) -> f64 {
        self.radius
    }

    fn outer_radius(&self) -> f64 {
        self.radius
    }
}
