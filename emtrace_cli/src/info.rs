use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::{Parser, ValueHint};
use emtrace::detector::{Detector, DetectorEnum};
use emtrace::params::DetectorType;
use prettytable::{cell, row};
use std::path::PathBuf;
use std::process::ExitCode;

/// Print a summary of a parameter deck and its derived geometry.
#[derive(Parser)]
pub struct Opts {
    /// Path to the YAML parameter deck.
    #[arg(value_hint = ValueHint::FilePath)]
    deck: PathBuf,
}

impl Subcommand for Opts {
    fn run(&self, _cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let deck = helpers::load_deck(&self.deck)?;
        let detector = emtrace::build_detector(&deck)?;

        let mut table = helpers::create_table();
        table.set_titles(row![c->"property", c->"value"]);
        table.add_row(row!["mode", format!("{:?}", deck.simulation.mode)]);
        table.add_row(row![
            "detector type",
            format!("{:?}", deck.detector.detector_type)
        ]);
        table.add_row(row!["materials", deck.materials.len().to_string()]);
        table.add_row(row![
            "emission energy (keV)",
            format!("{:.1}", deck.emission.energy_kev)
        ]);
        table.add_row(row![
            "inner radius (cm)",
            format!("{:.3}", detector.inner_radius())
        ]);
        table.add_row(row![
            "outer radius (cm)",
            format!("{:.3}", detector.outer_radius())
        ]);
        table.add_row(row![
            "forced interaction",
            deck.detector.do_forced_interaction.to_string()
        ]);

        match deck.detector.detector_type {
            DetectorType::Cylindrical => {
                let cylindrical = deck.detector.cylindrical.as_ref().unwrap();
                table.add_row(row!["rings", cylindrical.rings.len().to_string()]);
                let layers: usize = cylindrical.rings.iter().map(|r| r.layers.len()).sum();
                table.add_row(row!["layers", layers.to_string()]);
            }
            DetectorType::Planar | DetectorType::DualHeaded => {
                let planar = deck.detector.planar.as_ref().unwrap();
                table.add_row(row!["layers", planar.layers.len().to_string()]);
                table.add_row(row!["views", planar.num_views.to_string()]);
            }
            DetectorType::Block => {
                let block = deck.detector.block.as_ref().unwrap();
                table.add_row(row!["rings", block.rings.len().to_string()]);
                let blocks: usize = block.rings.iter().map(|r| r.blocks.len()).sum();
                table.add_row(row!["blocks", blocks.to_string()]);
                if let DetectorEnum::BlockDetector(block_detector) = &detector {
                    table.add_row(row![
                        "zones per ring",
                        block_detector.db().num_zones().to_string()
                    ]);
                }
            }
            _ => {}
        }

        table.printstd();
        Ok(ExitCode::SUCCESS)
    }
}
