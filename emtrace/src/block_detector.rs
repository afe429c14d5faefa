//! Block-detector tracker: projection onto the nearest block, the
//! block-to-block interaction walk, and the per-block centroid with the
//! optional snap to the nearest active crystal.

use crate::block_db::BlockDb;
use crate::centroid;
use crate::consts::MAX_DET_INTERACTIONS;
use crate::cylinder;
use crate::detector::{Detector, TrackAction};
use crate::error::Result;
use crate::geom2d::{self, Placement};
use crate::intra_block;
use crate::params::{BlockTomoParams, PositionAlgorithm};
use crate::photon::{ElementIndex, Photon};
use crate::ring_walker::{self, BlockExit};
use crate::sampler::Sampler;
use crate::xsection::CrossSection;

/// Rings of rotated rectangular blocks.
pub struct BlockDetector {
    db: BlockDb,
    cur_ring: usize,
    cur_block: usize,
}

impl BlockDetector {
    /// Builds the detector, validating the block geometry.
    ///
    /// # Errors
    ///
    /// Returns the geometry errors of [`BlockDb::build`].
    pub fn build(params: &BlockTomoParams, collimator_outer_radius: f64) -> Result<Self> {
        Ok(Self {
            db: BlockDb::build(params, collimator_outer_radius)?,
            cur_ring: 0,
            cur_block: 0,
        })
    }

    /// Read access to the block database.
    #[must_use]
    pub const fn db(&self) -> &BlockDb {
        &self.db
    }
}

impl Detector for BlockDetector {
    fn init_photon(&mut self, _decay_id: u64, _photon: &mut Photon, _sampler: &mut dyn Sampler) {
        // nothing to sample for block detectors
    }

    fn project_to_detector(&mut self, photon: &mut Photon) -> bool {
        let z_min = self.db.rings[0].z_low();
        let z_max = self.db.rings.last().unwrap().z_high();
        let mut inner = self.db.inner_cylinder;
        inner.z_min = z_min;
        inner.z_max = z_max;

        if self.db.in_inner_cylinder(photon.location.transaxial()) {
            // project out to the collimator surface
            let Some((new_pos, distance)) =
                cylinder::project_to_cylinder(&photon.location, photon.direction, &inner)
            else {
                // only moving axially; it leaves the detector
                return false;
            };
            if new_pos.z < z_min || new_pos.z > z_max {
                return false;
            }
            photon.move_to(new_pos, distance);
        } else if photon.location.z < z_min || photon.location.z > z_max {
            return false;
        }

        // make sure the photon is inside a ring
        let zone = match self.db.get_zone(&photon.location, None, None) {
            Some(found) => found,
            None => {
                if !ring_walker::proj_across_gap(&self.db, photon) {
                    return false;
                }
                let Some(found) = self.db.get_zone(&photon.location, None, None) else {
                    unreachable!(
                        "photon {} was not in its projected ring \
                         (BlockDetector::project_to_detector)",
                        photon.number
                    );
                };
                found
            }
        };

        if !self.db.in_outer_cylinder(photon.location.transaxial()) {
            return false;
        }

        let (its_ring, its_zone) = zone;
        match ring_walker::next_block(&self.db, photon, its_ring, its_zone, None) {
            Some(hit) => {
                self.cur_ring = hit.ring;
                self.cur_block = hit.block;
                true
            }
            None => false,
        }
    }

    fn free_paths_to_exit(&mut self, photon: &Photon, xsections: &dyn CrossSection) -> f64 {
        let mut working = photon.clone();
        let mut fp_to_exit = 0.0;
        let mut cur: Option<(usize, usize)> = Some((self.cur_ring, self.cur_block));

        // the photon's starting block, if it is already on or inside one
        if let Some((ring, block)) = cur {
            let record = self.db.record(ring, block);
            if geom2d::point_vs_rect(working.location.transaxial(), &record.rect)
                == Placement::Outside
            {
                cur = None;
            } else {
                let (_, exit_point, travel) =
                    ring_walker::dist_to_exit(&self.db, &mut working, record);
                fp_to_exit += intra_block::intra_free_paths(
                    xsections,
                    self.db.info(ring, block),
                    &working.location,
                    working.direction,
                    working.energy,
                    travel,
                );
                working.location = exit_point;
            }
        }

        loop {
            // find the next block on the path, crossing ring gaps as needed
            let zone = match self.db.get_zone(&working.location, cur.map(|c| c.0), None) {
                Some(found) => Some(found),
                None => {
                    if ring_walker::proj_across_gap(&self.db, &mut working) {
                        cur = None;
                        self.db.get_zone(&working.location, None, None)
                    } else {
                        None
                    }
                }
            };
            let Some((ring, zone)) = zone else {
                break;
            };

            let Some(hit) = ring_walker::next_block(&self.db, &mut working, ring, zone, cur)
            else {
                break;
            };

            let record = self.db.record(hit.ring, hit.block);
            if geom2d::point_vs_rect(working.location.transaxial(), &record.rect)
                != Placement::Outside
            {
                let (_, exit_point, travel) =
                    ring_walker::dist_to_exit(&self.db, &mut working, record);
                fp_to_exit += intra_block::intra_free_paths(
                    xsections,
                    self.db.info(hit.ring, hit.block),
                    &working.location,
                    working.direction,
                    working.energy,
                    travel,
                );
                working.location = exit_point;
            }
            cur = Some((hit.ring, hit.block));
        }

        fp_to_exit
    }

    fn find_next_interaction(
        &mut self,
        photon: &mut Photon,
        fp_to_go: &mut f64,
        xsections: &dyn CrossSection,
    ) -> TrackAction {
        let record = self.db.record(self.cur_ring, self.cur_block).clone();
        let (exit_side, exit_point, max_travel) =
            ring_walker::dist_to_exit(&self.db, photon, &record);

        assert!(
            exit_side != BlockExit::Failed,
            "photon {} failed to exit block ({}, {}) \
             (BlockDetector::find_next_interaction)",
            photon.number,
            self.cur_ring,
            self.cur_block
        );

        let result = intra_block::intra_distance(
            xsections,
            self.db.info(self.cur_ring, self.cur_block),
            &photon.location,
            photon.direction,
            photon.energy,
            *fp_to_go,
            max_travel,
        );

        if result.travel_distance <= max_travel {
            // interacted within this block
            photon.advance(result.travel_distance);
            *fp_to_go = 0.0;
            return TrackAction::Interact {
                material: result.material,
                is_active: result.is_active,
            };
        }

        // exited the block without interacting
        photon.move_to(exit_point, max_travel);
        *fp_to_go -= result.free_paths_used;

        let mut action = match exit_side {
            BlockExit::PrevRing => {
                if self.cur_ring == 0 {
                    TrackAction::Discard
                } else {
                    self.cur_ring -= 1;
                    ring_walker::proj_axially(photon, self.db.rings[self.cur_ring].z_high());
                    TrackAction::AxialCross
                }
            }
            BlockExit::NextRing => {
                if self.cur_ring + 1 >= self.db.rings.len() {
                    TrackAction::Discard
                } else {
                    self.cur_ring += 1;
                    ring_walker::proj_axially(photon, self.db.rings[self.cur_ring].z_low());
                    TrackAction::AxialCross
                }
            }
            BlockExit::Side => TrackAction::LayerCross,
            BlockExit::Failed => TrackAction::Discard,
        };

        if action != TrackAction::Discard {
            let p = photon.location.transaxial();
            if !self.db.in_outer_cylinder(p) || self.db.in_inner_cylinder(p) {
                action = TrackAction::Discard;
            }
        }

        if action != TrackAction::Discard {
            let Some((ring, zone)) = self.db.get_zone(&photon.location, Some(self.cur_ring), None)
            else {
                unreachable!(
                    "photon {} was not in its projected ring \
                     (BlockDetector::find_next_interaction)",
                    photon.number
                );
            };

            // don't re-enter the block being exited through a side face
            let exclude = if action == TrackAction::LayerCross {
                Some((record.ring, record.block))
            } else {
                None
            };

            match ring_walker::next_block(&self.db, photon, ring, zone, exclude) {
                Some(hit) => {
                    self.cur_ring = hit.ring;
                    self.cur_block = hit.block;
                }
                None => action = TrackAction::Discard,
            }
        }

        action
    }

    fn current_indices(&self) -> ElementIndex {
        ElementIndex {
            ring: self.cur_ring,
            block: self.cur_block,
            layer: 0,
            element: 0,
        }
    }

    fn find_detected_position(&mut self, photon: &mut Photon) {
        // group the interactions by (ring, block) and keep the set with the
        // greatest deposited energy
        let mut processed = [false; MAX_DET_INTERACTIONS];
        let mut best_energy = 0.0;
        let mut best = None;

        for first in 0..photon.interactions.len() {
            if processed[first] {
                continue;
            }
            let key = photon.interactions[first].indices;

            let mut in_set = [false; MAX_DET_INTERACTIONS];
            for (i, info) in photon.interactions.iter().enumerate().skip(first) {
                if info.indices.ring == key.ring && info.indices.block == key.block {
                    in_set[i] = true;
                    processed[i] = true;
                }
            }

            let (centroid_pos, set_energy) = centroid::centroid_of(
                photon
                    .interactions
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| in_set[*i])
                    .map(|(_, info)| info),
            );

            if set_energy >= best_energy {
                best_energy = set_energy;
                best = Some((centroid_pos, key.ring, key.block));
            }
        }

        let Some((centroid_pos, det_ring, det_block)) = best else {
            return;
        };
        photon.energy = best_energy;
        photon.detected_location = centroid_pos;

        // snap to the nearest active crystal (always recording its id)
        let Some((snapped, crystal)) =
            intra_block::find_centroid(&self.db, det_ring, det_block, &centroid_pos)
        else {
            unreachable!(
                "photon {} centroid could not be adjusted to an active crystal \
                 (BlockDetector::find_detected_position)",
                photon.number
            );
        };
        photon.detected_crystal = crystal;
        if self.db.position_algorithm == PositionAlgorithm::SnapCentroidToCrystalCenter {
            photon.detected_location = snapped;
        }
    }

    fn end_detection(&self, photon: &mut Photon) {
        photon.location = photon.detected_location;
        photon.clear_direction();
    }

    fn inner_radius(&self) -> f64 {
        self.db.inner_cylinder.radius
    }

    fn outer_radius(&self) -> f64 {
        self.db.outer_radius
    }
}
