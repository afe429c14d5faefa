//! Layered slab walker for planar and dual-headed detectors.
//!
//! Tracking happens in detector-local coordinates: x into the detector
//! (zero at the inner face), y transaxial, z axial. The view angle is
//! sampled once per decay; dual heads then pick the facing head per photon
//! through the big-cylinder projection.

use crate::centroid;
use crate::cylinder::{self, Cylinder};
use crate::detector::{Detector, TrackAction};
use crate::params::PlanarParams;
use crate::photon::{Direction, ElementIndex, Photon, Position};
use crate::sampler::Sampler;
use crate::xsection::CrossSection;

/// One slab layer.
#[derive(Clone, Debug)]
struct PlanarLayer {
    material: usize,
    depth: f64,
    is_active: bool,
}

/// Which boundary a projected segment ends on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SlabExit {
    /// No boundary: the photon interacts after the full distance.
    None,
    /// Out the front of the layer (toward the tomograph axis).
    XFront,
    /// Out the back of the layer (away from the axis).
    XBack,
    /// Out a transaxial side.
    Y,
    /// Out an axial side.
    Z,
}

/// Planar single head or opposed dual heads.
pub struct PlanarDetector {
    layers: Vec<PlanarLayer>,
    inner_radius: f64,
    axial_min: f64,
    axial_max: f64,
    trans_limit: f64,
    num_views: i64,
    min_angle: f64,
    view_delta: f64,
    dual_headed: bool,
    /// Cylinder through the detector's far corners, used to decide which
    /// head faces a photon.
    big_cylinder: Cylinder,
    cur_layer: usize,
    last_decay: Option<u64>,
    view_angle: f64,
}

impl PlanarDetector {
    /// Builds the detector from deck parameters.
    #[must_use]
    pub fn build(params: &PlanarParams, dual_headed: bool) -> Self {
        let axial_half = params.axial_length / 2.0;
        let trans_limit = params.transaxial_length / 2.0;
        let min_angle = params.min_angle_deg.to_radians();
        let max_angle = params.max_angle_deg.to_radians();
        let view_delta = if params.num_views > 0 {
            (max_angle - min_angle) / (params.num_views as f64)
        } else {
            0.0
        };

        let big_radius = params
            .inner_radius
            .hypot(trans_limit);

        Self {
            layers: params
                .layers
                .iter()
                .map(|layer| PlanarLayer {
                    material: layer.material,
                    depth: layer.depth,
                    is_active: layer.is_active,
                })
                .collect(),
            inner_radius: params.inner_radius,
            axial_min: -axial_half,
            axial_max: axial_half,
            trans_limit,
            num_views: params.num_views,
            min_angle,
            view_delta,
            dual_headed,
            big_cylinder: Cylinder::centered(big_radius, -axial_half, axial_half),
            cur_layer: 0,
            last_decay: None,
            view_angle: 0.0,
        }
    }

    fn total_depth(&self) -> f64 {
        self.layers.iter().map(|layer| layer.depth).sum()
    }

    /// Front and back faces of layer `layer` in detector coordinates.
    fn layer_faces(&self, layer: usize) -> (f64, f64) {
        let front: f64 = self.layers[..layer].iter().map(|l| l.depth).sum();
        (front, front + self.layers[layer].depth)
    }

    /// Picks the head (the sampled angle or the opposite one) facing the
    /// photon, by projecting it to the big cylinder and comparing polar
    /// angles.
    fn facing_head(&self, location: &Position, direction: Direction, view: f64) -> f64 {
        let beta = cylinder::project_to_cylinder(location, direction, &self.big_cylinder)
            .map_or_else(
                || location.y.atan2(location.x),
                |(big_pos, _)| big_pos.y.atan2(big_pos.x),
            );

        let mut difference = view - beta;
        if difference < -std::f64::consts::PI {
            difference += std::f64::consts::TAU;
        } else if difference > std::f64::consts::PI {
            difference -= std::f64::consts::TAU;
        }

        if difference.abs() > std::f64::consts::FRAC_PI_2 {
            if view < std::f64::consts::PI {
                view + std::f64::consts::PI
            } else {
                view - std::f64::consts::PI
            }
        } else {
            view
        }
    }

    /// Rotates a tomograph position/direction into detector coordinates for
    /// the photon's view angle.
    fn to_detector_frame(&self, photon: &Photon) -> (Position, Direction) {
        let (sin, cos) = photon.detector_angle.sin_cos();
        let pos = Position::new(
            photon.location.x.mul_add(cos, photon.location.y * sin) - self.inner_radius,
            (-photon.location.x).mul_add(sin, photon.location.y * cos),
            photon.location.z,
        );
        let dir = Direction::new(
            photon.direction.cx.mul_add(cos, photon.direction.cy * sin),
            (-photon.direction.cx).mul_add(sin, photon.direction.cy * cos),
            photon.direction.cz,
        );
        (pos, dir)
    }

    /// Projects one segment within a layer: the nearest of the layer faces,
    /// the transaxial bounds, the axial bounds, and the requested distance.
    fn project_within_layer(
        &self,
        pos: &Position,
        dir: Direction,
        distance: f64,
        front: f64,
        back: f64,
    ) -> (SlabExit, Position, f64) {
        let dist_y = if dir.cy > 0.0 {
            (self.trans_limit - pos.y) / dir.cy
        } else if dir.cy < 0.0 {
            (-self.trans_limit - pos.y) / dir.cy
        } else {
            f64::MAX
        };
        let dist_z = if dir.cz > 0.0 {
            (self.axial_max - pos.z) / dir.cz
        } else if dir.cz < 0.0 {
            (self.axial_min - pos.z) / dir.cz
        } else {
            f64::MAX
        };
        let dist_x = if dir.cx > 0.0 {
            (back - pos.x) / dir.cx
        } else if dir.cx < 0.0 {
            (front - pos.x) / dir.cx
        } else {
            f64::MAX
        };

        let (exit, traveled) = if dist_x < dist_y && dist_x < dist_z && dist_x < distance {
            let side = if dir.cx > 0.0 {
                SlabExit::XBack
            } else {
                SlabExit::XFront
            };
            (side, dist_x)
        } else if dist_y < dist_z && dist_y < distance {
            (SlabExit::Y, dist_y)
        } else if dist_z < distance {
            (SlabExit::Z, dist_z)
        } else {
            (SlabExit::None, distance)
        };

        // project even when exiting, so the photon ends on the boundary
        (exit, pos.along(dir, traveled), traveled)
    }
}

impl Detector for PlanarDetector {
    fn init_photon(&mut self, decay_id: u64, photon: &mut Photon, sampler: &mut dyn Sampler) {
        if self.last_decay != Some(decay_id) {
            self.last_decay = Some(decay_id);
            self.view_angle = if self.num_views > 0 {
                let step = (sampler.uniform() * (self.num_views as f64)).floor();
                step.mul_add(self.view_delta, self.min_angle + self.view_delta / 2.0)
            } else {
                sampler.uniform() * std::f64::consts::TAU
            };
        }

        photon.detector_angle = if self.dual_headed {
            self.facing_head(&photon.location, photon.direction, self.view_angle)
        } else {
            self.view_angle
        };
    }

    fn project_to_detector(&mut self, photon: &mut Photon) -> bool {
        let (mut pos, dir) = self.to_detector_frame(photon);

        // a photon moving away from (or parallel to) the face never arrives
        if dir.cx <= 0.0 {
            return false;
        }

        let t = -pos.x / dir.cx;
        pos = pos.along(dir, t);
        // round-off can leave x slightly negative; put it exactly on the face
        pos.x = 0.0;

        if pos.z > self.axial_max || pos.z < self.axial_min {
            return false;
        }
        if pos.y > self.trans_limit || pos.y < -self.trans_limit {
            return false;
        }

        photon.location = pos;
        photon.direction = dir;
        photon.travel_distance += t;
        self.cur_layer = 0;
        true
    }

    fn free_paths_to_exit(&mut self, photon: &Photon, xsections: &dyn CrossSection) -> f64 {
        let pos = photon.location;
        let dir = photon.direction;

        let dist_y = if dir.cy > 0.0 {
            (self.trans_limit - pos.y) / dir.cy
        } else if dir.cy < 0.0 {
            (-self.trans_limit - pos.y) / dir.cy
        } else {
            f64::MAX
        };
        let dist_z = if dir.cz > 0.0 {
            (self.axial_max - pos.z) / dir.cz
        } else if dir.cz < 0.0 {
            (self.axial_min - pos.z) / dir.cz
        } else {
            f64::MAX
        };

        let mut fp_to_exit = 0.0;
        let mut tracked = 0.0;
        for layer in &self.layers {
            let attenuation = xsections.attenuation(layer.material, photon.energy);
            let dist_x = layer.depth / dir.cx + tracked;

            let (distance, exits) = if dist_x < dist_y && dist_x < dist_z {
                (dist_x, false)
            } else if dist_y < dist_z {
                (dist_y, true)
            } else {
                (dist_z, true)
            };

            fp_to_exit += (distance - tracked) * attenuation;
            tracked = distance;
            if exits {
                break;
            }
        }

        fp_to_exit
    }

    fn find_next_interaction(
        &mut self,
        photon: &mut Photon,
        fp_to_go: &mut f64,
        xsections: &dyn CrossSection,
    ) -> TrackAction {
        let layer = &self.layers[self.cur_layer];
        let (front, back) = self.layer_faces(self.cur_layer);
        let attenuation = xsections.attenuation(layer.material, photon.energy);

        let distance = *fp_to_go / attenuation;
        let (exit, new_pos, traveled) =
            self.project_within_layer(&photon.location, photon.direction, distance, front, back);

        let action = match exit {
            SlabExit::XBack => {
                if self.cur_layer + 1 == self.layers.len() {
                    TrackAction::Discard
                } else {
                    self.cur_layer += 1;
                    *fp_to_go -= traveled * attenuation;
                    TrackAction::LayerCross
                }
            }
            SlabExit::XFront => {
                if self.cur_layer == 0 {
                    TrackAction::Discard
                } else {
                    self.cur_layer -= 1;
                    *fp_to_go -= traveled * attenuation;
                    TrackAction::LayerCross
                }
            }
            SlabExit::Y | SlabExit::Z => TrackAction::Discard,
            SlabExit::None => TrackAction::Interact {
                material: layer.material,
                is_active: layer.is_active,
            },
        };

        photon.move_to(new_pos, traveled);
        action
    }

    fn current_indices(&self) -> ElementIndex {
        ElementIndex {
            ring: 0,
            block: self.cur_layer,
            layer: 0,
            element: 0,
        }
    }

    fn find_detected_position(&mut self, photon: &mut Photon) {
        centroid::centroid_of_all(photon);
    }

    fn end_detection(&self, photon: &mut Photon) {
        // rotate the detector-local centroid back into tomograph coordinates
        let (sin, cos) = photon.detector_angle.sin_cos();
        let local = photon.detected_location;
        photon.location = Position::new(
            self.inner_radius.mul_add(cos, local.x.mul_add(cos, -(local.y * sin))),
            self.inner_radius.mul_add(sin, local.x.mul_add(sin, local.y * cos)),
            local.z,
        );
        photon.clear_direction();
    }

    fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    fn outer_radius(&self) -> f64 {
        self.inner_radius + self.total_depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::sampler::SequenceSampler;
    use crate::xsection::{MaterialData, XsecTables};
    use float_cmp::assert_approx_eq;

    fn detector(dual: bool) -> PlanarDetector {
        PlanarDetector::build(&fixtures::csi_planar(), dual)
    }

    fn xsections() -> XsecTables {
        XsecTables::new(&[MaterialData::uniform("csi", 2.2, 0.2, 0.9)]).unwrap()
    }

    #[test]
    fn view_angle_is_sampled_once_per_decay() {
        let mut det = detector(false);
        let mut sampler = SequenceSampler::new(vec![0.5, 0.99]);
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            140.0,
            1.0,
        );

        det.init_photon(1, &mut photon, &mut sampler);
        let first = photon.detector_angle;
        det.init_photon(1, &mut photon, &mut sampler);
        assert_approx_eq!(f64, photon.detector_angle, first, ulps = 2);

        det.init_photon(2, &mut photon, &mut sampler);
        assert!((photon.detector_angle - first).abs() > 1e-6);
    }

    #[test]
    fn head_on_photon_projects_to_the_face() {
        let mut det = detector(false);
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            140.0,
            1.0,
        );
        photon.detector_angle = 0.0;
        assert!(det.project_to_detector(&mut photon));
        assert_approx_eq!(f64, photon.location.x, 0.0, ulps = 2);
        assert_approx_eq!(f64, photon.travel_distance, 30.0, epsilon = 1e-9);
        assert_approx_eq!(f64, photon.direction.cx, 1.0, ulps = 2);
    }

    #[test]
    fn parallel_photon_is_rejected() {
        let mut det = detector(true);
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(0.0, 1.0, 0.0),
            511.0,
            1.0,
        );
        // emitted parallel to the detector plane of the view at angle 0
        photon.detector_angle = 0.0;
        assert!(!det.project_to_detector(&mut photon));
    }

    #[test]
    fn dual_heads_pick_the_facing_head() {
        let det = detector(true);
        // photon heading in -x from the origin faces the head at pi
        let angle = det.facing_head(
            &Position::new(0.0, 0.0, 0.0),
            Direction::new(-1.0, 0.0, 0.0),
            0.0,
        );
        assert_approx_eq!(f64, angle, std::f64::consts::PI, epsilon = 1e-9);

        // heading in +x keeps the sampled head
        let angle = det.facing_head(
            &Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            0.0,
        );
        assert_approx_eq!(f64, angle, 0.0, ulps = 2);
    }

    #[test]
    fn interaction_within_the_layer() {
        let mut det = detector(false);
        let xs = xsections();
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            140.0,
            1.0,
        );
        photon.detector_angle = 0.0;
        assert!(det.project_to_detector(&mut photon));

        // mu = 2.2: 1.1 free paths stop at x = 0.5
        let mut fp = 1.1;
        let action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        assert_eq!(
            action,
            TrackAction::Interact {
                material: 0,
                is_active: true
            }
        );
        assert_approx_eq!(f64, photon.location.x, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn escape_out_the_back_discards() {
        let mut det = detector(false);
        let xs = xsections();
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            140.0,
            1.0,
        );
        photon.detector_angle = 0.0;
        assert!(det.project_to_detector(&mut photon));

        let mut fp = 100.0;
        let action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        assert_eq!(action, TrackAction::Discard);
        assert_approx_eq!(f64, photon.location.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn free_paths_to_exit_through_the_slab() {
        let mut det = detector(false);
        let xs = xsections();
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            140.0,
            1.0,
        );
        photon.detector_angle = 0.0;
        assert!(det.project_to_detector(&mut photon));
        let fp = det.free_paths_to_exit(&photon, &xs);
        assert_approx_eq!(f64, fp, 2.2, epsilon = 1e-9);
    }

    #[test]
    fn oblique_photon_pays_more_free_paths() {
        let mut det = detector(false);
        let xs = xsections();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(s, 0.0, s),
            140.0,
            1.0,
        );
        // already in detector coordinates at the face
        photon.detector_angle = 0.0;
        photon.location = Position::new(0.0, 0.0, 0.0);
        let fp = det.free_paths_to_exit(&photon, &xs);
        assert_approx_eq!(f64, fp, 2.2 / s, epsilon = 1e-9);
    }

    #[test]
    fn detection_rotates_back_to_tomograph_coordinates() {
        let det = detector(false);
        let mut photon = Photon::new(
            0,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            140.0,
            1.0,
        );
        photon.detector_angle = std::f64::consts::FRAC_PI_2;
        photon.detected_location = Position::new(0.5, 0.0, 1.0);
        det.end_detection(&mut photon);
        assert_approx_eq!(f64, photon.location.x, 0.0, epsilon = 1e-9);
        assert_approx_eq!(f64, photon.location.y, 30.5, epsilon = 1e-9);
        assert_approx_eq!(f64, photon.location.z, 1.0, ulps = 2);
    }
}
