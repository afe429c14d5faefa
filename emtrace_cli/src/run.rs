use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use emtrace::centroid::{EnergyBlur, TimeBlur};
use emtrace::driver::{self, DriverOptions, HookMode, NoHooks, TrackingContext};
use emtrace::history::{DetectionSink, HistoryWriter, NullSink};
use emtrace::params::{Deck, ScanMode};
use emtrace::photon::{Direction, Photon, PhotonColor, Position};
use emtrace::sampler::{RngSampler, Sampler};
use emtrace::xsection::XsecTables;
use prettytable::{cell, row};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run a simulation from a parameter deck.
#[derive(Parser)]
pub struct Opts {
    /// Path to the YAML parameter deck.
    #[arg(value_hint = ValueHint::FilePath)]
    deck: PathBuf,
    /// Override the number of decays in the deck.
    #[arg(long)]
    num_decays: Option<u64>,
    /// Override the random seed in the deck.
    #[arg(long)]
    seed: Option<u64>,
}

/// Samples an isotropic unit direction (two uniforms).
fn isotropic_direction(sampler: &mut dyn Sampler) -> Direction {
    let cos_z = 2.0_f64.mul_add(sampler.uniform(), -1.0);
    let sin_z = cos_z.mul_add(-cos_z, 1.0).max(0.0).sqrt();
    let phi = std::f64::consts::TAU * sampler.uniform();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Direction::new(sin_z * cos_phi, sin_z * sin_phi, cos_z)
}

fn driver_options(deck: &Deck) -> DriverOptions {
    DriverOptions {
        do_forced_interaction: deck.detector.do_forced_interaction,
        model_coherent_scatter: deck.simulation.model_coherent_scatter,
        energy_blur: deck
            .energy_blur()
            .map(|(pct, reference)| EnergyBlur {
                resolution_percentage: pct,
                reference_energy_kev: reference,
            }),
        time_blur: (deck.detector.photon_time_fwhm_ns > 0.0).then(|| TimeBlur {
            fwhm_ns: deck.detector.photon_time_fwhm_ns,
        }),
    }
}

impl Subcommand for Opts {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let deck = helpers::load_deck(&self.deck)?;
        let num_decays = self.num_decays.unwrap_or(deck.simulation.num_decays);
        let seed = self.seed.unwrap_or(deck.simulation.seed);

        let mut detector = emtrace::build_detector(&deck)?;
        let xsections = XsecTables::new(&deck.materials)?;
        let mut ctx = TrackingContext::new(&xsections, driver_options(&deck));
        let mut sampler = RngSampler(Pcg64::seed_from_u64(seed));

        let mut sink: Box<dyn DetectionSink> = match &deck.detector.history_file {
            Some(path) => {
                let file = File::create(path).with_context(|| {
                    format!("unable to create history file '{}'", path.display())
                })?;
                Box::new(HistoryWriter::new(BufWriter::new(file))?)
            }
            None => Box::new(NullSink),
        };

        let hook_mode = match deck.simulation.mode {
            ScanMode::Pet => HookMode::Pet,
            ScanMode::Spect => HookMode::Spect,
        };
        let origin = Position::new(
            deck.emission.position[0],
            deck.emission.position[1],
            deck.emission.position[2],
        );

        let mut hooks = NoHooks;
        let mut photon_number = 0_u64;
        for decay_id in 0..num_decays {
            let direction = isotropic_direction(&mut sampler);

            let mut photons = match deck.simulation.mode {
                ScanMode::Pet => {
                    // an annihilation pair: blue along the sampled
                    // direction, pink back-to-back
                    let blue =
                        Photon::new(photon_number, origin, direction, deck.emission.energy_kev, 1.0);
                    let mut pink = Photon::new(
                        photon_number + 1,
                        origin,
                        direction.reversed(),
                        deck.emission.energy_kev,
                        1.0,
                    );
                    pink.color = PhotonColor::Pink;
                    photon_number += 2;
                    vec![blue, pink]
                }
                ScanMode::Spect => {
                    let photon =
                        Photon::new(photon_number, origin, direction, deck.emission.energy_kev, 1.0);
                    photon_number += 1;
                    vec![photon]
                }
            };

            driver::process_decay(
                &mut detector,
                decay_id,
                &mut photons,
                hook_mode,
                &mut ctx,
                &mut sampler,
                sink.as_mut(),
                &mut hooks,
            )?;
        }

        if !cfg.quiet {
            let mut table = helpers::create_table();
            table.set_titles(row![c->"detector statistic", c->"value"]);
            table.add_row(row!["decays simulated", r->num_decays.to_string()]);
            for (label, value) in ctx.stats.report_lines() {
                table.add_row(row![label, r->value]);
            }
            table.printstd();
        }

        Ok(ExitCode::SUCCESS)
    }
}
