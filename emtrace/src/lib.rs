#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! Monte Carlo photon-transport core for emission tomography (PET and
//! SPECT) detectors: geometric tracking through simple, planar,
//! cylindrical, and block scintillator hierarchies, with Compton/coherent
//! scatter, forced first interaction, and energy-weighted centroid
//! positioning.

pub mod block_db;
pub mod block_detector;
pub mod centroid;
pub mod consts;
pub mod cylinder;
pub mod cylinder_detector;
pub mod detector;
pub mod driver;
pub mod error;
pub mod forced;
pub mod geom2d;
pub mod history;
pub mod intra_block;
pub mod params;
pub mod photon;
pub mod planar_detector;
pub mod ring_walker;
pub mod sampler;
pub mod scatter;
pub mod simple_detector;
pub mod stats;
pub mod xsection;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::detector::DetectorEnum;
use crate::error::{Error, Result};
use crate::params::{Deck, DetectorType};

/// Builds the configured detector from a validated deck.
///
/// # Errors
///
/// Returns configuration or geometry errors for inconsistent decks.
pub fn build_detector(deck: &Deck) -> Result<DetectorEnum> {
    deck.validate()?;

    let collimator_radius = deck.detector.collimator_outer_radius.unwrap_or(0.0);

    match deck.detector.detector_type {
        DetectorType::SimplePet | DetectorType::SimpleSpect => Ok(DetectorEnum::from(
            simple_detector::SimpleDetector::new(collimator_radius),
        )),
        DetectorType::Planar => Ok(DetectorEnum::from(planar_detector::PlanarDetector::build(
            deck.detector.planar.as_ref().unwrap(),
            false,
        ))),
        DetectorType::DualHeaded => Ok(DetectorEnum::from(
            planar_detector::PlanarDetector::build(deck.detector.planar.as_ref().unwrap(), true),
        )),
        DetectorType::Cylindrical => Ok(DetectorEnum::from(
            cylinder_detector::CylindricalDetector::build(
                deck.detector.cylindrical.as_ref().unwrap(),
            )?,
        )),
        DetectorType::Block => {
            let Some(radius) = deck.detector.collimator_outer_radius else {
                return Err(Error::Config(
                    "block detectors need collimator_outer_radius as their inner bound".into(),
                ));
            };
            Ok(DetectorEnum::from(block_detector::BlockDetector::build(
                deck.detector.block.as_ref().unwrap(),
                radius,
            )?))
        }
        DetectorType::UncSpect | DetectorType::Polygonal => unreachable!(
            "rejected by Deck::validate"
        ),
    }
}
