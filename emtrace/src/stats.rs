//! Per-run detector statistics.
//!
//! Counters live in an explicit struct owned by the tracking context;
//! parallel callers keep their own and merge at the end of a run.

use crate::consts::MAX_DET_INTERACTIONS;
use serde::{Deserialize, Serialize};

/// Counters accumulated while tracking photons through the detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DetStats {
    /// Blue photons handed to the detector.
    pub tot_blue_photons: u64,
    /// Pink photons handed to the detector.
    pub tot_pink_photons: u64,
    /// Accepted blue photons.
    pub tot_accepted_blue_photons: u64,
    /// Accepted pink photons.
    pub tot_accepted_pink_photons: u64,
    /// Photons that reached the crystal surface.
    pub tot_reaching_crystal: u64,
    /// Photons absorbed in the detector.
    pub tot_photons_absorbed: u64,
    /// Weight absorbed in the detector.
    pub tot_wt_absorbed: f64,
    /// Photons absorbed on their first interaction.
    pub tot_first_time_absorptions: u64,
    /// Weight absorbed on first interactions.
    pub tot_wt_first_time_absorbed: f64,
    /// Scatters converted to absorptions by the minimum-energy rule.
    pub tot_forced_absorptions: u64,
    /// Photons that hit the interaction-count cap.
    pub num_reached_max_interactions: u64,
    /// Photons that crossed the detector without interacting.
    pub tot_photons_passing_through: u64,
    /// Photons that deposited energy in an active layer.
    pub tot_photons_depositing_energy: u64,
    /// Weight removed by forced-interaction rescaling.
    pub weight_adjusted: f64,
    /// Absorbed weight, binned by the number of interactions.
    pub weight_absorbed_bins: [f64; MAX_DET_INTERACTIONS + 1],
    /// Escaped weight, binned by the number of interactions.
    pub weight_escaped_bins: [f64; MAX_DET_INTERACTIONS + 1],
}

impl Default for DetStats {
    fn default() -> Self {
        Self {
            tot_blue_photons: 0,
            tot_pink_photons: 0,
            tot_accepted_blue_photons: 0,
            tot_accepted_pink_photons: 0,
            tot_reaching_crystal: 0,
            tot_photons_absorbed: 0,
            tot_wt_absorbed: 0.0,
            tot_first_time_absorptions: 0,
            tot_wt_first_time_absorbed: 0.0,
            tot_forced_absorptions: 0,
            num_reached_max_interactions: 0,
            tot_photons_passing_through: 0,
            tot_photons_depositing_energy: 0,
            weight_adjusted: 0.0,
            weight_absorbed_bins: [0.0; MAX_DET_INTERACTIONS + 1],
            weight_escaped_bins: [0.0; MAX_DET_INTERACTIONS + 1],
        }
    }
}

impl DetStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds another set of counters into this one.
    pub fn merge(&mut self, other: &Self) {
        self.tot_blue_photons += other.tot_blue_photons;
        self.tot_pink_photons += other.tot_pink_photons;
        self.tot_accepted_blue_photons += other.tot_accepted_blue_photons;
        self.tot_accepted_pink_photons += other.tot_accepted_pink_photons;
        self.tot_reaching_crystal += other.tot_reaching_crystal;
        self.tot_photons_absorbed += other.tot_photons_absorbed;
        self.tot_wt_absorbed += other.tot_wt_absorbed;
        self.tot_first_time_absorptions += other.tot_first_time_absorptions;
        self.tot_wt_first_time_absorbed += other.tot_wt_first_time_absorbed;
        self.tot_forced_absorptions += other.tot_forced_absorptions;
        self.num_reached_max_interactions += other.num_reached_max_interactions;
        self.tot_photons_passing_through += other.tot_photons_passing_through;
        self.tot_photons_depositing_energy += other.tot_photons_depositing_energy;
        self.weight_adjusted += other.weight_adjusted;
        for (mine, theirs) in self
            .weight_absorbed_bins
            .iter_mut()
            .zip(&other.weight_absorbed_bins)
        {
            *mine += theirs;
        }
        for (mine, theirs) in self
            .weight_escaped_bins
            .iter_mut()
            .zip(&other.weight_escaped_bins)
        {
            *mine += theirs;
        }
    }

    /// The report lines printed at the end of a run, as (label, value)
    /// pairs.
    #[must_use]
    pub fn report_lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("blue photons processed", self.tot_blue_photons.to_string()),
            ("pink photons processed", self.tot_pink_photons.to_string()),
            (
                "accepted blue photons",
                self.tot_accepted_blue_photons.to_string(),
            ),
            (
                "accepted pink photons",
                self.tot_accepted_pink_photons.to_string(),
            ),
            (
                "photons reaching crystal",
                self.tot_reaching_crystal.to_string(),
            ),
            ("photons absorbed", self.tot_photons_absorbed.to_string()),
            ("weight absorbed", format!("{:.6e}", self.tot_wt_absorbed)),
            (
                "first-interaction absorptions",
                self.tot_first_time_absorptions.to_string(),
            ),
            (
                "weight absorbed on first interaction",
                format!("{:.6e}", self.tot_wt_first_time_absorbed),
            ),
            (
                "forced absorptions",
                self.tot_forced_absorptions.to_string(),
            ),
            (
                "photons reaching interaction cap",
                self.num_reached_max_interactions.to_string(),
            ),
            (
                "photons passing through",
                self.tot_photons_passing_through.to_string(),
            ),
            (
                "photons depositing energy",
                self.tot_photons_depositing_energy.to_string(),
            ),
            (
                "weight removed by forced interaction",
                format!("{:.6e}", self.weight_adjusted),
            ),
        ]
    }
}
