//! Top-level per-photon driver: project to the detector, run the
//! interaction loop, compute the detected position, and emit the photon to
//! the detection sink.

use crate::centroid::{EnergyBlur, TimeBlur};
use crate::consts::MAX_DET_INTERACTIONS;
use crate::detector::{Detector, DetectorEnum, TrackAction};
use crate::error::Result;
use crate::history::{DetectedPhoton, DetectionSink};
use crate::forced;
use crate::photon::{Interaction, Photon, PhotonColor};
use crate::sampler::Sampler;
use crate::scatter::{self, InteractionOutcome};
use crate::stats::DetStats;
use crate::xsection::CrossSection;

/// What became of one tracked photon.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhotonFate {
    /// Never reached the detector.
    Rejected,
    /// Deposited active energy and was recorded.
    Detected,
    /// Absorbed without depositing active energy.
    Absorbed,
    /// Left the detector without depositing active energy.
    Escaped,
}

/// Per-photon user hooks with no-op defaults. Implementations must preserve
/// the photon-count and weight invariants of the core.
pub trait UserHooks {
    /// Inspect/modify a PET photon before tracking; `false` rejects it.
    fn modify_pet_photon(&mut self, _photon: &mut Photon) -> bool {
        true
    }

    /// Inspect/modify a SPECT photon before tracking; `false` rejects it.
    fn modify_spect_photon(&mut self, _photon: &mut Photon) -> bool {
        true
    }
}

/// The default hook set: everything passes unchanged.
pub struct NoHooks;

impl UserHooks for NoHooks {}

/// Tracking options derived from the parameter deck.
#[derive(Clone, Copy, Debug, Default)]
pub struct DriverOptions {
    /// Force the first interaction, rescaling the weight.
    pub do_forced_interaction: bool,
    /// Model coherent scatter in the detector.
    pub model_coherent_scatter: bool,
    /// Gaussian energy blur, if enabled.
    pub energy_blur: Option<EnergyBlur>,
    /// Gaussian time-of-flight blur, if enabled.
    pub time_blur: Option<TimeBlur>,
}

/// Everything the driver threads through one photon.
pub struct TrackingContext<'a> {
    /// Cross-section service.
    pub xsections: &'a dyn CrossSection,
    /// Tracking options.
    pub options: DriverOptions,
    /// Run statistics, owned by this context.
    pub stats: DetStats,
}

impl<'a> TrackingContext<'a> {
    /// Creates a context with zeroed statistics.
    #[must_use]
    pub fn new(xsections: &'a dyn CrossSection, options: DriverOptions) -> Self {
        Self {
            xsections,
            options,
            stats: DetStats::new(),
        }
    }
}

/// Tracks one photon through the detector and, when it deposits active
/// energy, emits it to the sink.
///
/// # Errors
///
/// Propagates sink errors.
pub fn track_photon(
    detector: &mut DetectorEnum,
    photon: &mut Photon,
    decay_id: u64,
    ctx: &mut TrackingContext,
    sampler: &mut dyn Sampler,
    sink: &mut dyn DetectionSink,
) -> Result<PhotonFate> {
    detector.init_photon(decay_id, photon, sampler);

    // simple detectors never track: blur and accept as-is
    if let DetectorEnum::SimpleDetector(_) = detector {
        apply_blurs(&ctx.options, photon, sampler);
        detector.find_detected_position(photon);
        sink.record(&DetectedPhoton::from_photon(decay_id, photon))?;
        return Ok(PhotonFate::Detected);
    }

    if !detector.project_to_detector(photon) {
        return Ok(PhotonFate::Rejected);
    }
    ctx.stats.tot_reaching_crystal += 1;

    // free paths to the first interaction point
    let mut fp_to_go = if ctx.options.do_forced_interaction {
        let fp_to_exit = detector.free_paths_to_exit(photon, ctx.xsections);
        let forced = forced::truncated_free_paths(fp_to_exit, &mut photon.weight, sampler);
        ctx.stats.weight_adjusted += forced.weight_decrement * photon.decay_weight;
        forced.fp_to_go
    } else {
        sampler.free_paths()
    };

    let mut active_deposited = 0.0;
    let mut absorbed = false;
    let mut forced_absorption = false;

    loop {
        let action = detector.find_next_interaction(photon, &mut fp_to_go, ctx.xsections);

        match action {
            TrackAction::Interact { material, is_active } => {
                let initial_energy = photon.energy;
                let at_cap = photon.num_interactions() + 1 == MAX_DET_INTERACTIONS;

                let outcome = if at_cap {
                    // the interaction cap converts this into an absorption
                    photon.energy = 0.0;
                    InteractionOutcome::Absorbed { forced: false }
                } else {
                    scatter::perform_interaction(
                        ctx.xsections,
                        material,
                        photon,
                        ctx.options.model_coherent_scatter,
                        sampler,
                    )
                };

                if outcome == InteractionOutcome::NoOp {
                    // disabled coherent scatter: the interaction never
                    // happened; redraw and continue
                    fp_to_go = sampler.free_paths();
                    continue;
                }

                let deposited = initial_energy - photon.energy;
                let recorded = if is_active { deposited } else { 0.0 };
                photon.interactions.push(Interaction {
                    position: photon.location,
                    indices: detector.current_indices(),
                    energy_deposited: recorded,
                    is_active,
                });
                active_deposited += recorded;

                match outcome {
                    InteractionOutcome::Absorbed { forced } => {
                        absorbed = true;
                        forced_absorption = forced;
                        break;
                    }
                    InteractionOutcome::Scattered => {
                        fp_to_go = sampler.free_paths();
                    }
                    InteractionOutcome::NoOp => unreachable!(),
                }
            }
            TrackAction::LayerCross | TrackAction::AxialCross => {}
            TrackAction::Discard => {
                let bin = photon.num_interactions().min(MAX_DET_INTERACTIONS);
                ctx.stats.weight_escaped_bins[bin] += photon.weight * photon.decay_weight;
                break;
            }
        }
    }

    if absorbed {
        update_absorption_stats(ctx, photon, forced_absorption);
    }

    let fate = if active_deposited > 0.0 {
        ctx.stats.tot_photons_depositing_energy += 1;
        detector.find_detected_position(photon);
        detector.end_detection(photon);
        apply_blurs(&ctx.options, photon, sampler);
        sink.record(&DetectedPhoton::from_photon(decay_id, photon))?;
        PhotonFate::Detected
    } else if absorbed {
        PhotonFate::Absorbed
    } else {
        PhotonFate::Escaped
    };

    if photon.num_interactions() == 0 {
        ctx.stats.tot_photons_passing_through += 1;
    }

    Ok(fate)
}

fn update_absorption_stats(ctx: &mut TrackingContext, photon: &Photon, forced: bool) {
    let stats = &mut ctx.stats;
    let weight = photon.weight * photon.decay_weight;
    let num = photon.num_interactions();

    stats.tot_photons_absorbed += 1;
    stats.tot_wt_absorbed += weight;
    if forced {
        stats.tot_forced_absorptions += 1;
    }
    if num == MAX_DET_INTERACTIONS {
        stats.num_reached_max_interactions += 1;
    }
    if num <= MAX_DET_INTERACTIONS {
        stats.weight_absorbed_bins[num] += weight;
    }
    if num == 1 {
        stats.tot_first_time_absorptions += 1;
        stats.tot_wt_first_time_absorbed += weight;
    }
}

fn apply_blurs(options: &DriverOptions, photon: &mut Photon, sampler: &mut dyn Sampler) {
    if let Some(blur) = options.energy_blur {
        photon.energy = blur.blur(photon.energy, sampler);
    }
    if let Some(blur) = options.time_blur {
        photon.travel_distance = blur.blur(photon.travel_distance, sampler);
    }
}

/// Whether a run is PET (photon pairs) or SPECT (singles), for hook
/// selection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookMode {
    /// PET hooks.
    Pet,
    /// SPECT hooks.
    Spect,
}

/// Processes the photons of one decay in emission order, applying the user
/// hooks and accumulating acceptance statistics.
///
/// # Errors
///
/// Propagates sink errors.
#[allow(clippy::too_many_arguments)]
pub fn process_decay(
    detector: &mut DetectorEnum,
    decay_id: u64,
    photons: &mut [Photon],
    mode: HookMode,
    ctx: &mut TrackingContext,
    sampler: &mut dyn Sampler,
    sink: &mut dyn DetectionSink,
    hooks: &mut dyn UserHooks,
) -> Result<Vec<PhotonFate>> {
    let mut fates = Vec::with_capacity(photons.len());

    for photon in photons.iter_mut() {
        match photon.color {
            PhotonColor::Blue => ctx.stats.tot_blue_photons += 1,
            PhotonColor::Pink => ctx.stats.tot_pink_photons += 1,
        }

        let passes = match mode {
            HookMode::Pet => hooks.modify_pet_photon(photon),
            HookMode::Spect => hooks.modify_spect_photon(photon),
        };
        if !passes {
            fates.push(PhotonFate::Rejected);
            continue;
        }

        let fate = track_photon(detector, photon, decay_id, ctx, sampler, sink)?;
        if fate == PhotonFate::Detected {
            match photon.color {
                PhotonColor::Blue => ctx.stats.tot_accepted_blue_photons += 1,
                PhotonColor::Pink => ctx.stats.tot_accepted_pink_photons += 1,
            }
        }
        fates.push(fate);
    }

    Ok(fates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cylinder_detector::CylindricalDetector;
    use crate::fixtures;
    use crate::history::VecSink;
    use crate::photon::{Direction, Position};
    use crate::sampler::SequenceSampler;
    use crate::xsection::{MaterialData, XsecTables};
    use float_cmp::assert_approx_eq;

    fn cylinder_detector() -> DetectorEnum {
        DetectorEnum::from(
            CylindricalDetector::build(&fixtures::one_layer_cylinder()).unwrap(),
        )
    }

    fn absorbing_xsections() -> XsecTables {
        XsecTables::new(&[MaterialData::uniform("absorber", 1.0, 0.0, 0.0)]).unwrap()
    }

    fn photon_from_center() -> Photon {
        Photon::new(
            1,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            511.0,
            1.0,
        )
    }

    #[test]
    fn absorbing_photon_is_detected_at_its_interaction_point() {
        let xs = absorbing_xsections();
        let mut detector = cylinder_detector();
        let mut ctx = TrackingContext::new(&xs, DriverOptions::default());
        let mut sink = VecSink::new();

        // free-path draw lands 0.5 mean free paths in; the decision draw
        // (0.99 > p_scatter = 0) absorbs
        let fp_draw = 1.0 - (-0.5_f64).exp();
        let mut sampler = SequenceSampler::new(vec![fp_draw, 0.99]);

        let mut photon = photon_from_center();
        let fate = track_photon(
            &mut detector,
            &mut photon,
            1,
            &mut ctx,
            &mut sampler,
            &mut sink,
        )
        .unwrap();

        assert_eq!(fate, PhotonFate::Detected);
        assert_eq!(sink.detections.len(), 1);
        let detection = &sink.detections[0];
        assert_approx_eq!(f64, detection.location.x, 40.5, epsilon = 1e-9);
        assert_approx_eq!(f64, detection.energy, 511.0, ulps = 2);
        assert_eq!(ctx.stats.tot_photons_absorbed, 1);
        assert_eq!(ctx.stats.tot_first_time_absorptions, 1);
        assert_eq!(ctx.stats.tot_photons_depositing_energy, 1);
    }

    #[test]
    fn missing_photon_is_rejected() {
        let xs = absorbing_xsections();
        let mut detector = cylinder_detector();
        let mut ctx = TrackingContext::new(&xs, DriverOptions::default());
        let mut sink = VecSink::new();
        let mut sampler = SequenceSampler::new(vec![0.5]);

        let mut photon = photon_from_center();
        photon.direction = Direction::new(0.0, 0.0, 1.0);
        let fate = track_photon(
            &mut detector,
            &mut photon,
            1,
            &mut ctx,
            &mut sampler,
            &mut sink,
        )
        .unwrap();
        assert_eq!(fate, PhotonFate::Rejected);
        assert_eq!(ctx.stats.tot_reaching_crystal, 0);
        assert!(sink.detections.is_empty());
    }

    #[test]
    fn pass_through_photon_escapes() {
        let xs = absorbing_xsections();
        let mut detector = cylinder_detector();
        let mut ctx = TrackingContext::new(&xs, DriverOptions::default());
        let mut sink = VecSink::new();

        // a huge free-path draw sails through the 3 cm layer
        let fp_draw = 1.0 - (-50.0_f64).exp();
        let mut sampler = SequenceSampler::new(vec![fp_draw]);

        let mut photon = photon_from_center();
        let fate = track_photon(
            &mut detector,
            &mut photon,
            1,
            &mut ctx,
            &mut sampler,
            &mut sink,
        )
        .unwrap();
        assert_eq!(fate, PhotonFate::Escaped);
        assert_eq!(ctx.stats.tot_photons_passing_through, 1);
        assert!(sink.detections.is_empty());
    }

    #[test]
    fn forced_interaction_rescales_the_weight() {
        let xs = absorbing_xsections();
        let mut detector = cylinder_detector();
        let options = DriverOptions {
            do_forced_interaction: true,
            ..DriverOptions::default()
        };
        let mut ctx = TrackingContext::new(&xs, options);
        let mut sink = VecSink::new();

        // forced draw then the absorption decision
        let mut sampler = SequenceSampler::new(vec![0.3, 0.99]);
        let mut photon = photon_from_center();
        let fate = track_photon(
            &mut detector,
            &mut photon,
            1,
            &mut ctx,
            &mut sampler,
            &mut sink,
        )
        .unwrap();

        assert_eq!(fate, PhotonFate::Detected);
        // fp to exit is 3.0 (3 cm at mu = 1)
        let expected_weight = 1.0 - (-3.0_f64).exp();
        assert_approx_eq!(f64, photon.weight, expected_weight, epsilon = 1e-12);
        assert_approx_eq!(
            f64,
            ctx.stats.weight_adjusted,
            1.0 - expected_weight,
            epsilon = 1e-12
        );
    }

    #[test]
    fn weight_never_increases() {
        let xs = XsecTables::new(&[MaterialData::uniform("mix", 1.0, 0.5, 1.0)]).unwrap();
        let mut detector = cylinder_detector();
        let mut ctx = TrackingContext::new(&xs, DriverOptions::default());
        let mut sink = VecSink::new();
        let mut sampler =
            SequenceSampler::new(vec![0.4, 0.3, 0.6, 0.2, 0.8, 0.55, 0.1, 0.9, 0.35]);

        let mut photon = photon_from_center();
        let weight_in = photon.weight;
        let _ = track_photon(
            &mut detector,
            &mut photon,
            1,
            &mut ctx,
            &mut sampler,
            &mut sink,
        )
        .unwrap();
        assert!(photon.weight <= weight_in);
        // without forced interaction the weight is untouched
        assert_approx_eq!(f64, photon.weight, weight_in, ulps = 2);
    }

    #[test]
    fn hooks_can_reject_photons() {
        struct RejectAll;
        impl UserHooks for RejectAll {
            fn modify_pet_photon(&mut self, _photon: &mut Photon) -> bool {
                false
            }
        }

        let xs = absorbing_xsections();
        let mut detector = cylinder_detector();
        let mut ctx = TrackingContext::new(&xs, DriverOptions::default());
        let mut sink = VecSink::new();
        let mut sampler = SequenceSampler::new(vec![0.5]);
        let mut photons = vec![photon_from_center()];

        let fates = process_decay(
            &mut detector,
            1,
            &mut photons,
            HookMode::Pet,
            &mut ctx,
            &mut sampler,
            &mut sink,
            &mut RejectAll,
        )
        .unwrap();
        assert_eq!(fates, vec![PhotonFate::Rejected]);
        assert_eq!(ctx.stats.tot_blue_photons, 1);
        assert_eq!(ctx.stats.tot_accepted_blue_photons, 0);
    }

    #[test]
    fn energy_deposits_sum_to_the_incoming_energy() {
        // scattering layer: every interaction is a Compton until the photon
        // is absorbed or escapes
        let xs = XsecTables::new(&[MaterialData::uniform("mix", 2.0, 0.5, 1.0)]).unwrap();
        let mut detector = cylinder_detector();
        let mut ctx = TrackingContext::new(&xs, DriverOptions::default());
        let mut sink = VecSink::new();
        let mut sampler = SequenceSampler::new(vec![
            0.2, 0.3, 0.6, 0.25, 0.45, 0.9, 0.15, 0.7, 0.4, 0.85, 0.05, 0.5,
        ]);

        let mut photon = photon_from_center();
        let fate = track_photon(
            &mut detector,
            &mut photon,
            1,
            &mut ctx,
            &mut sampler,
            &mut sink,
        )
        .unwrap();

        if fate == PhotonFate::Detected && ctx.stats.tot_photons_absorbed == 1 {
            let total: f64 = photon
                .interactions
                .iter()
                .map(|i| i.energy_deposited)
                .sum();
            assert_approx_eq!(f64, total, 511.0, epsilon = 1e-9);
        }
    }
}
