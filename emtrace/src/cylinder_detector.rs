//! Ring/layer walker for concentric cylindrical detectors.
//!
//! The projection of one tracking segment is factored into
//! [`CylindricalDetector::project_segment`], which both the interaction
//! walker and the free-paths-to-exit walk drive; the two differ only in what
//! they do with each segment.

use crate::centroid;
use crate::consts::INNER_SURFACE_SLACK;
use crate::cylinder::{self, Cylinder};
use crate::detector::{Detector, TrackAction};
use crate::error::{Error, Result};
use crate::params::CylindricalParams;
use crate::photon::{ElementIndex, Photon, Position};
use crate::sampler::Sampler;
use crate::xsection::CrossSection;

/// One radial layer of a ring.
#[derive(Clone, Debug)]
pub struct CylLayer {
    /// Material index.
    pub material: usize,
    /// Inner radius (cm).
    pub inner_radius: f64,
    /// Outer radius (cm).
    pub outer_radius: f64,
    /// Whether deposits here contribute to the centroid.
    pub is_active: bool,
}

/// One axial ring.
#[derive(Clone, Debug)]
pub struct CylRing {
    /// Lower axial bound (cm).
    pub min_z: f64,
    /// Upper axial bound (cm).
    pub max_z: f64,
    /// Radial layers from the inside out.
    pub layers: Vec<CylLayer>,
}

/// What one projected segment runs into.
enum SegmentEvent {
    /// The free paths run out first.
    Interact,
    /// The segment ends on a layer wall; the value is the new layer as a
    /// signed index (may be out of range).
    LayerCross(i64),
    /// The segment ends on an axial ring face; the value is the new ring as
    /// a signed index (may be out of range).
    AxialCross(i64),
}

/// Concentric-ring cylindrical detector.
pub struct CylindricalDetector {
    rings: Vec<CylRing>,
    cur_ring: usize,
    cur_layer: usize,
    /// The first segment after projection is known to move outward, so the
    /// inner-wall test is skipped for it.
    first_time: bool,
}

impl CylindricalDetector {
    /// Builds the detector from deck parameters, materializing axial gaps
    /// between rings as inactive gap-material rings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when rings leave a gap without naming
    /// a gap material.
    pub fn build(params: &CylindricalParams) -> Result<Self> {
        let mut rings: Vec<CylRing> = Vec::new();

        for (r, ring) in params.rings.iter().enumerate() {
            if let Some(prev) = rings.last() {
                let gap = ring.min_z - prev.max_z;
                if gap > 1e-9 {
                    let Some(gap_material) = params.rings[r - 1].gap_material else {
                        return Err(Error::Config(format!(
                            "rings {} and {r} leave an axial gap but no gap material",
                            r - 1
                        )));
                    };
                    let inner = prev.layers[0]
                        .inner_radius
                        .min(ring.layers[0].inner_radius);
                    let outer = prev
                        .layers
                        .last()
                        .unwrap()
                        .outer_radius
                        .max(ring.layers.last().unwrap().outer_radius);
                    rings.push(CylRing {
                        min_z: prev.max_z,
                        max_z: ring.min_z,
                        layers: vec![CylLayer {
                            material: gap_material,
                            inner_radius: inner,
                            outer_radius: outer,
                            is_active: false,
                        }],
                    });
                }
            }

            rings.push(CylRing {
                min_z: ring.min_z,
                max_z: ring.max_z,
                layers: ring
                    .layers
                    .iter()
                    .map(|layer| CylLayer {
                        material: layer.material,
                        inner_radius: layer.inner_radius,
                        outer_radius: layer.outer_radius,
                        is_active: layer.is_active,
                    })
                    .collect(),
            });
        }

        Ok(Self {
            rings,
            cur_ring: 0,
            cur_layer: 0,
            first_time: true,
        })
    }

    /// The detector's full axial range.
    fn z_range(&self) -> (f64, f64) {
        (
            self.rings[0].min_z,
            self.rings[self.rings.len() - 1].max_z,
        )
    }

    /// Bounding cylinders of layer `layer` in ring `ring`, spanning the full
    /// detector axially.
    fn bound_cylinders(&self, ring: usize, layer: usize) -> (Cylinder, Cylinder) {
        let (z_min, z_max) = self.z_range();
        let info = &self.rings[ring].layers[layer];
        (
            Cylinder::centered(info.inner_radius, z_min, z_max),
            Cylinder::centered(info.outer_radius, z_min, z_max),
        )
    }

    /// The ring containing axial position `z`: the first ring whose upper
    /// bound is not below it.
    fn find_ring(&self, z: f64) -> Option<usize> {
        let ring = self.rings.iter().position(|ring| z <= ring.max_z)?;
        (z >= self.rings[ring].min_z).then_some(ring)
    }

    /// The layer of ring `ring` containing the 2-D radius of `pos`:
    /// starting from the inside, the first layer whose outer radius exceeds
    /// it.
    fn find_layer(&self, ring: usize, pos: &Position) -> Option<usize> {
        let radius = pos.x.hypot(pos.y);
        self.rings[ring]
            .layers
            .iter()
            .position(|layer| radius < layer.outer_radius)
    }

    /// The positive distance to the axial faces of ring `ring`, or `None`
    /// for a purely transaxial photon.
    fn wall_distance(&self, ring: usize, photon_pos: &Position, cz: f64) -> Option<(f64, bool)> {
        if cz == 0.0 {
            return None;
        }
        let info = &self.rings[ring];
        let to_max = (info.max_z - photon_pos.z) / cz;
        let to_min = (info.min_z - photon_pos.z) / cz;

        // exactly one face lies ahead; a vanishing distance counts as behind
        if to_max > 0.0 && (to_min < 0.0 || to_min.abs() < 1e-5) {
            Some((to_max, true))
        } else if to_min > 0.0 && (to_max < 0.0 || to_max.abs() < 1e-5) {
            Some((to_min, false))
        } else {
            Some((to_max.max(to_min), to_max > to_min))
        }
    }

    /// Projects one segment from the photon's position: the nearest of the
    /// free-path distance, the layer walls, and the ring faces.
    ///
    /// `distance` carries the free-path-implied travel distance in and the
    /// actual segment length out.
    fn project_segment(
        &self,
        ring: usize,
        layer: usize,
        photon_pos: &Position,
        photon_dir: crate::photon::Direction,
        first_time: bool,
        distance: &mut f64,
    ) -> (SegmentEvent, Position) {
        let (in_cyl, out_cyl) = self.bound_cylinders(ring, layer);

        let inner_dist = if first_time {
            None
        } else {
            cylinder::inner_distance(photon_pos, photon_dir, &in_cyl).filter(|&d| d > 0.0)
        };

        let event = if let Some(dist_to_inner) = inner_dist {
            // heading inward: the inner wall caps the segment
            match self.wall_distance(ring, photon_pos, photon_dir.cz) {
                Some((wall, to_max)) if wall > 0.0 && wall < dist_to_inner => {
                    if wall > *distance {
                        SegmentEvent::Interact
                    } else {
                        *distance = wall;
                        let new_ring = if to_max { ring as i64 + 1 } else { ring as i64 - 1 };
                        SegmentEvent::AxialCross(new_ring)
                    }
                }
                _ => {
                    if dist_to_inner > *distance {
                        SegmentEvent::Interact
                    } else {
                        *distance = dist_to_inner;
                        SegmentEvent::LayerCross(layer as i64 - 1)
                    }
                }
            }
        } else {
            // heading outward
            let dist_to_outer =
                cylinder::project_to_cylinder(photon_pos, photon_dir, &out_cyl)
                    .map_or(f64::MAX, |(_, d)| d);

            match self.wall_distance(ring, photon_pos, photon_dir.cz) {
                Some((wall, to_max)) if wall > 0.0 && wall < dist_to_outer => {
                    if wall > *distance {
                        SegmentEvent::Interact
                    } else {
                        *distance = wall;
                        let new_ring = if to_max { ring as i64 + 1 } else { ring as i64 - 1 };
                        SegmentEvent::AxialCross(new_ring)
                    }
                }
                _ => {
                    if dist_to_outer > *distance {
                        SegmentEvent::Interact
                    } else {
                        *distance = dist_to_outer;
                        SegmentEvent::LayerCross(layer as i64 + 1)
                    }
                }
            }
        };

        (event, photon_pos.along(photon_dir, *distance))
    }
}

impl Detector for CylindricalDetector {
    fn init_photon(&mut self, _decay_id: u64, _photon: &mut Photon, _sampler: &mut dyn Sampler) {
        // nothing to sample for cylindrical detectors
    }

    fn project_to_detector(&mut self, photon: &mut Photon) -> bool {
        let (z_min, z_max) = self.z_range();
        let inner = Cylinder::centered(self.rings[0].layers[0].inner_radius, z_min, z_max);

        let r_sqrd = photon
            .location
            .x
            .mul_add(photon.location.x, photon.location.y * photon.location.y);

        if r_sqrd < inner.radius.mul_add(inner.radius, -INNER_SURFACE_SLACK) {
            // project onto the inner surface
            let Some((new_pos, distance)) =
                cylinder::project_to_cylinder(&photon.location, photon.direction, &inner)
            else {
                return false;
            };
            if new_pos.z >= inner.z_max || new_pos.z <= inner.z_min {
                return false;
            }
            photon.move_to(new_pos, distance);
        } else if photon.location.z >= inner.z_max || photon.location.z <= inner.z_min {
            return false;
        }

        let Some(ring) = self.find_ring(photon.location.z) else {
            return false;
        };
        self.cur_ring = ring;
        self.cur_layer = 0;
        self.first_time = true;
        true
    }

    fn free_paths_to_exit(&mut self, photon: &Photon, xsections: &dyn CrossSection) -> f64 {
        let mut position = photon.location;
        let mut ring = self.cur_ring;
        let mut layer = self.cur_layer;
        let first_time = self.first_time;
        let mut fp_to_exit = 0.0;

        loop {
            let material = self.rings[ring].layers[layer].material;
            let attenuation = xsections.attenuation(material, photon.energy);

            // the walk never interacts, so the distance cap is unreachable
            let mut distance = f64::MAX;
            let (event, new_pos) = self.project_segment(
                ring,
                layer,
                &position,
                photon.direction,
                first_time,
                &mut distance,
            );

            fp_to_exit += attenuation * distance;

            match event {
                SegmentEvent::Interact => unreachable!("uncapped segment cannot interact"),
                SegmentEvent::LayerCross(new_layer) => {
                    if new_layer < 0
                        || new_layer as usize >= self.rings[ring].layers.len()
                    {
                        break;
                    }
                    layer = new_layer as usize;
                    position = new_pos;
                }
                SegmentEvent::AxialCross(new_ring) => {
                    if new_ring < 0 || new_ring as usize >= self.rings.len() {
                        break;
                    }
                    ring = new_ring as usize;
                    position = new_pos;
                    layer = self.find_layer(ring, &position).unwrap_or(0);
                }
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
        let ring = self.cur_ring;
        let layer = self.cur_layer;
        let info = &self.rings[ring].layers[layer];
        let attenuation = xsections.attenuation(info.material, photon.energy);

        // the distance implied by the free paths, ignoring boundaries
        let mut distance = *fp_to_go / attenuation;
        let (event, new_pos) = self.project_segment(
            ring,
            layer,
            &photon.location,
            photon.direction,
            self.first_time,
            &mut distance,
        );
        self.first_time = false;

        let action = match event {
            SegmentEvent::LayerCross(new_layer) => {
                if new_layer < 0 || new_layer as usize >= self.rings[ring].layers.len() {
                    TrackAction::Discard
                } else {
                    self.cur_layer = new_layer as usize;
                    *fp_to_go -= distance * attenuation;
                    TrackAction::LayerCross
                }
            }
            SegmentEvent::AxialCross(new_ring) => {
                if new_ring < 0 || new_ring as usize >= self.rings.len() {
                    TrackAction::Discard
                } else {
                    self.cur_ring = new_ring as usize;
                    let layer = self.find_layer(self.cur_ring, &new_pos);
                    assert!(
                        layer.is_some(),
                        "photon {} crossed into ring {} outside every layer \
                         (CylindricalDetector::find_next_interaction)",
                        photon.number,
                        self.cur_ring
                    );
                    self.cur_layer = layer.unwrap();
                    *fp_to_go -= distance * attenuation;
                    TrackAction::AxialCross
                }
            }
            SegmentEvent::Interact => {
                let info = &self.rings[self.cur_ring].layers[self.cur_layer];
                TrackAction::Interact {
                    material: info.material,
                    is_active: info.is_active,
                }
            }
        };

        photon.move_to(new_pos, distance);
        action
    }

    fn current_indices(&self) -> ElementIndex {
        ElementIndex {
            ring: self.cur_ring,
            block: self.cur_layer,
            layer: 0,
            element: 0,
        }
    }

    fn find_detected_position(&mut self, photon: &mut Photon) {
        centroid::centroid_of_all(photon);
    }

    fn end_detection(&self, photon: &mut Photon) {
        photon.location = photon.detected_location;
        photon.clear_direction();
    }

    fn inner_radius(&self) -> f64 {
        self.rings[0].layers[0].inner_radius
    }

    fn outer_radius(&self) -> f64 {
        self.rings
            .iter()
            .flat_map(|ring| ring.layers.iter())
            .map(|layer| layer.outer_radius)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::photon::Direction;
    use crate::xsection::{MaterialData, XsecTables};
    use float_cmp::assert_approx_eq;

    fn detector() -> CylindricalDetector {
        CylindricalDetector::build(&fixtures::two_layer_cylinder()).unwrap()
    }

    fn xsections() -> XsecTables {
        XsecTables::new(&[
            MaterialData::uniform("scatterer", 1.0, 1.0, 1.0),
            MaterialData::uniform("absorber", 2.0, 0.0, 0.0),
        ])
        .unwrap()
    }

    fn photon_entering() -> Photon {
        Photon::new(
            7,
            Position::new(0.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
            511.0,
            1.0,
        )
    }

    #[test]
    fn projection_reaches_the_inner_surface() {
        let mut det = detector();
        let mut photon = photon_entering();
        assert!(det.project_to_detector(&mut photon));
        assert_approx_eq!(f64, photon.location.x, 40.0, epsilon = 1e-9);
        assert_approx_eq!(f64, photon.travel_distance, 40.0, epsilon = 1e-9);
        assert_eq!(det.cur_ring, 0);
        assert_eq!(det.cur_layer, 0);
    }

    #[test]
    fn axial_photon_is_rejected() {
        let mut det = detector();
        let mut photon = photon_entering();
        photon.direction = Direction::new(0.0, 0.0, 1.0);
        assert!(!det.project_to_detector(&mut photon));
    }

    #[test]
    fn interaction_happens_inside_the_first_layer() {
        let mut det = detector();
        let xs = xsections();
        let mut photon = photon_entering();
        assert!(det.project_to_detector(&mut photon));

        // 0.5 free paths in material 0 (mu = 1) stop after 0.5 cm
        let mut fp = 0.5;
        let action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        assert_eq!(
            action,
            TrackAction::Interact {
                material: 0,
                is_active: true
            }
        );
        assert_approx_eq!(f64, photon.location.x, 40.5, epsilon = 1e-9);
    }

    #[test]
    fn layer_cross_consumes_free_paths() {
        let mut det = detector();
        let xs = xsections();
        let mut photon = photon_entering();
        assert!(det.project_to_detector(&mut photon));

        // 3 free paths reach past the 2 cm of layer 0
        let mut fp = 3.0;
        let action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        assert_eq!(action, TrackAction::LayerCross);
        assert_eq!(det.cur_layer, 1);
        assert_approx_eq!(f64, photon.location.x, 42.0, epsilon = 1e-9);
        assert_approx_eq!(f64, fp, 1.0, epsilon = 1e-9);

        // the remaining free path stops after 0.5 cm in material 1 (mu = 2)
        let action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        assert_eq!(
            action,
            TrackAction::Interact {
                material: 1,
                is_active: true
            }
        );
        assert_approx_eq!(f64, photon.location.x, 42.5, epsilon = 1e-9);
    }

    #[test]
    fn escape_through_the_outer_layer_discards() {
        let mut det = detector();
        let xs = xsections();
        let mut photon = photon_entering();
        assert!(det.project_to_detector(&mut photon));

        let mut fp = 100.0;
        let mut action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        while action.continues() {
            action = det.find_next_interaction(&mut photon, &mut fp, &xs);
        }
        assert_eq!(action, TrackAction::Discard);
        assert_approx_eq!(f64, photon.location.x, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn free_paths_to_exit_spans_both_layers() {
        let mut det = detector();
        let xs = xsections();
        let mut photon = photon_entering();
        assert!(det.project_to_detector(&mut photon));

        // 2 cm at mu = 1 plus 3 cm at mu = 2
        let fp = det.free_paths_to_exit(&photon, &xs);
        assert_approx_eq!(f64, fp, 2.0 + 6.0, epsilon = 1e-9);
    }

    #[test]
    fn gap_rings_are_materialized() {
        let mut params = fixtures::two_layer_cylinder();
        params.rings[0].gap_material = Some(1);
        let mut second = params.rings[0].clone();
        second.min_z = 12.0;
        second.max_z = 20.0;
        params.rings.push(second);

        let det = CylindricalDetector::build(&params).unwrap();
        assert_eq!(det.rings.len(), 3);
        assert_approx_eq!(f64, det.rings[1].min_z, 10.0, ulps = 2);
        assert_approx_eq!(f64, det.rings[1].max_z, 12.0, ulps = 2);
        assert!(!det.rings[1].layers[0].is_active);

        // without a gap material the same deck fails to build
        let mut bad = fixtures::two_layer_cylinder();
        let mut second = bad.rings[0].clone();
        second.min_z = 12.0;
        second.max_z = 20.0;
        bad.rings.push(second);
        assert!(CylindricalDetector::build(&bad).is_err());
    }
}
