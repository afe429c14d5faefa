//! Next-event search for a photon inside a block-detector ring but outside
//! any block: nearest of a block face, a zone boundary, the inner or outer
//! cylinder, or an axial ring face.
//!
//! The original recursion over zone and ring crossings is expressed as an
//! explicit loop in [`next_block`].

use crate::block_db::{BlockDb, BlockRecord, BlockRing};
use crate::consts::{
    AXIAL_COSINE_DEFECT, LONG_SEGMENT, PARALLEL_DETERMINANT, VERY_LONG_SEGMENT,
};
use crate::cylinder::{self, Cylinder};
use crate::geom2d::{self, Placement, Point2};
use crate::photon::{Photon, Position};
use std::cmp::Ordering;

/// Event classes produced while walking a ring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RingEvent {
    /// Hit a block face.
    Block,
    /// Entered the inner (collimator) cylinder.
    InnerCyl,
    /// Left through the outer cylinder.
    OuterCyl,
    /// Left the detector axially at either end.
    OutEnd,
    /// Crossed into the next ring (greater z).
    NextRing,
    /// Crossed into the previous ring (lesser z).
    PrevRing,
    /// Crossed into the next zone (counterclockwise).
    NextZone,
    /// Crossed into the previous zone (clockwise).
    PrevZone,
}

/// A block reached by [`next_block`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockHit {
    /// Ring of the block.
    pub ring: usize,
    /// Zone the search ended in.
    pub zone: usize,
    /// Block index within the ring.
    pub block: usize,
}

/// Projects the photon to the axial plane `z_dest`. Returns `false` for a
/// photon with no axial motion.
pub fn proj_axially(photon: &mut Photon, z_dest: f64) -> bool {
    let distance = z_dest - photon.location.z;
    if photon.direction.cz.abs() <= 1e-12 || distance == 0.0 {
        return false;
    }

    let travel = distance / photon.direction.cz;
    photon.location.x = photon.direction.cx.mul_add(travel, photon.location.x);
    photon.location.y = photon.direction.cy.mul_add(travel, photon.location.y);
    photon.location.z = z_dest;
    photon.travel_distance += travel;
    true
}

/// Projects a photon sitting in a gap between rings to the nearest ring
/// boundary in its direction of travel. `false` when it cannot enter a ring
/// (leaves axially, or lands outside the radial bounds).
pub fn proj_across_gap(db: &BlockDb, photon: &mut Photon) -> bool {
    let z = photon.location.z;

    let z_ring = if photon.direction.cz > 0.0 {
        db.rings.iter().map(BlockRing::z_low).find(|&zr| z < zr)
    } else if photon.direction.cz < 0.0 {
        db.rings.iter().rev().map(BlockRing::z_high).find(|&zr| z > zr)
    } else {
        // purely radial motion between rings leaves the detector
        None
    };

    let Some(z_ring) = z_ring else {
        return false;
    };

    proj_axially(photon, z_ring);

    let p = photon.location.transaxial();
    db.in_outer_cylinder(p) && !db.in_inner_cylinder(p)
}

/// Whether the photon's path crosses a boundary of zone `(ring, zone)`, and
/// if so which one, where, and how far away. Uses the law of sines on the
/// triangle formed by the origin ray of the boundary, the position ray, and
/// the photon path.
#[must_use]
pub fn cross_zone_bounds(
    db: &BlockDb,
    photon: &Photon,
    ring: usize,
    zone: usize,
) -> Option<(RingEvent, Position, f64)> {
    let _ = ring; // all rings share the same zone partition

    let (zone_low, zone_high) = db.zone_range(zone);

    // photon's angular direction relative to its position ray:
    // counterclockwise, clockwise, or purely radial
    let radius_2d = photon.location.x.hypot(photon.location.y);
    let pos_cos = photon.location.x / radius_2d;
    let pos_sin = photon.location.y / radius_2d;
    let dir_norm = photon.direction.cx.hypot(photon.direction.cy);
    if dir_norm < 1e-12 {
        // purely axial motion never meets a zone boundary
        return None;
    }
    let dir_cos = photon.direction.cx / dir_norm;
    let dir_sin = photon.direction.cy / dir_norm;
    let ang_direction = geom2d::dir_cos_cmp(dir_cos, dir_sin, pos_cos, pos_sin);

    if ang_direction == Ordering::Equal {
        // radial motion cannot cross a zone boundary
        return None;
    }

    let sin_z = photon.direction.sin_z();

    let theta_of = |cos: f64, sin: f64| {
        let t = cos.acos();
        if sin < 0.0 { std::f64::consts::TAU - t } else { t }
    };
    let pos_theta = theta_of(pos_cos, pos_sin);
    let dir_theta = theta_of(dir_cos, dir_sin);

    // interior angle at the photon position, and the arc from the position
    // to the boundary it is moving toward
    let (pos_dir_theta, zone_photon_theta, event) = if ang_direction == Ordering::Greater {
        // counterclockwise: heading for the greater boundary
        let pos_dir = if dir_theta < pos_theta {
            -std::f64::consts::PI - (dir_theta - pos_theta)
        } else {
            std::f64::consts::PI - (dir_theta - pos_theta)
        };
        let bound_theta = theta_of(zone_high.cos, zone_high.sin);
        let zone_photon = if bound_theta < pos_theta {
            std::f64::consts::TAU + bound_theta - pos_theta
        } else {
            bound_theta - pos_theta
        };
        (pos_dir, zone_photon, RingEvent::NextZone)
    } else {
        // clockwise: heading for the lesser boundary
        let pos_dir = if pos_theta < dir_theta {
            -std::f64::consts::PI - (pos_theta - dir_theta)
        } else {
            std::f64::consts::PI - (pos_theta - dir_theta)
        };
        let bound_theta = theta_of(zone_low.cos, zone_low.sin);
        let zone_photon = if pos_theta < bound_theta {
            std::f64::consts::TAU + pos_theta - bound_theta
        } else {
            pos_theta - bound_theta
        };
        (pos_dir, zone_photon, RingEvent::PrevZone)
    };

    let proj_theta = std::f64::consts::PI - (zone_photon_theta + pos_dir_theta);
    if proj_theta <= 0.0 {
        // no triangle forms; the path never reaches the boundary
        return None;
    }

    let xy_dist = zone_photon_theta.sin() * radius_2d / proj_theta.sin();
    let distance = xy_dist / sin_z;
    let position = photon.location.along(photon.direction, distance);

    Some((event, position, distance))
}

/// Distance along the photon's path to the given block, with the hit point.
///
/// `None` when the path misses the block, the photon sits on the boundary
/// heading outward, or the ring is exited axially before the hit.
#[must_use]
pub fn calc_distance_to_block(
    db: &BlockDb,
    record: &BlockRecord,
    position: &Position,
    direction: crate::photon::Direction,
) -> Option<(f64, Position)> {
    let ring = &db.rings[record.ring];
    let ring_minus = ring.z_low();
    let ring_plus = ring.z_high();

    // photon and block must share the ring
    if position.z < ring_minus || ring_plus < position.z {
        return None;
    }

    let p1 = position.transaxial();
    match geom2d::point_vs_rect(p1, &record.rect) {
        Placement::Inside => Some((0.0, *position)),
        Placement::OnBound => {
            if on_boundary_heading_inward(record, p1, direction) {
                Some((0.0, *position))
            } else {
                None
            }
        }
        Placement::Outside => {
            let p2 = Point2::new(
                LONG_SEGMENT.mul_add(direction.cx, p1.x),
                LONG_SEGMENT.mul_add(direction.cy, p1.y),
            );
            if p1 == p2 {
                // purely axial motion cannot reach the block
                return None;
            }
            let seg_line = geom2d::normal_line(p1, p2);
            let sine_z2 = direction.cz.mul_add(-direction.cz, 1.0);

            let mut best: Option<(f64, Position)> = None;
            for e in 0..4 {
                let (e1, e2) = record.rect.edge(e);
                let side = geom2d::segments_intersect(p1, p2, e1, e2);
                if side == Placement::Outside {
                    continue;
                }

                let edge_line = geom2d::normal_line(e1, e2);
                let det = seg_line.cos.mul_add(edge_line.sin, -(edge_line.cos * seg_line.sin));
                if det.abs() < PARALLEL_DETERMINANT {
                    // overlapping lines: the photon skims the edge without
                    // entering
                    continue;
                }

                let mut hit_x =
                    seg_line.sin.mul_add(edge_line.dist, -(edge_line.sin * seg_line.dist)) / det;
                let mut hit_y =
                    edge_line.cos.mul_add(seg_line.dist, -(seg_line.cos * edge_line.dist)) / det;

                if side == Placement::OnBound {
                    // crossing through a corner: snap to the closest one
                    let d1 = (hit_x - e1.x) + (hit_y - e1.y);
                    let d2 = (hit_x - e2.x) + (hit_y - e2.y);
                    let corner = if d1 < d2 { e1 } else { e2 };
                    hit_x = corner.x;
                    hit_y = corner.y;
                }

                let side_dist2 = (hit_x - p1.x).powi(2) + (hit_y - p1.y).powi(2);
                let hit_distance = (side_dist2 / sine_z2).sqrt();
                let hit_z = direction.cz.mul_add(hit_distance, position.z);

                if hit_z < ring_minus || hit_z > ring_plus {
                    // exits the ring axially before reaching this edge
                    continue;
                }

                if best.is_none_or(|(d, _)| hit_distance < d) {
                    best = Some((hit_distance, Position::new(hit_x, hit_y, hit_z)));
                }
            }
            best
        }
    }
}

/// For a photon on the block boundary: `true` when its forward path enters
/// the block. Each edge the photon lies on is tested by projecting halfway
/// toward the opposite edge and checking the point stays between them.
fn on_boundary_heading_inward(
    record: &BlockRecord,
    p1: Point2,
    direction: crate::photon::Direction,
) -> bool {
    for e in 0..4 {
        let (e1, e2) = record.rect.edge(e);
        let edge_line = geom2d::normal_line(e1, e2);
        if edge_line.signed_distance(p1).abs() >= 1e-7 {
            continue;
        }

        // photon lies on this edge; check against the opposite one
        let (o1, o2) = record.rect.edge((e + 2) % 4);
        let opp_line = geom2d::normal_line(o1, o2);
        let half_dist = ((edge_line.dist - opp_line.dist) / 2.0).abs();
        let midpoint = Point2::new(
            half_dist.mul_add(direction.cx, p1.x),
            half_dist.mul_add(direction.cy, p1.y),
        );

        if geom2d::point_vs_parallel_lines(midpoint, &edge_line, &opp_line) != Placement::Inside {
            return false;
        }
    }
    true
}

/// How a photon leaves a block it is inside of.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockExit {
    /// Through a side face, staying in the ring.
    Side,
    /// Through the ring's lesser axial face.
    PrevRing,
    /// Through the ring's greater axial face.
    NextRing,
    /// The photon could not be brought to the block at all (caller treats
    /// this as a tracking failure).
    Failed,
}

/// Exit point of the photon's ray from the given block and the travel
/// distance to it. The photon is restored to its original state before
/// returning.
pub fn dist_to_exit(
    db: &BlockDb,
    photon: &mut Photon,
    record: &BlockRecord,
) -> (BlockExit, Position, f64) {
    let orig_location = photon.location;
    let orig_travel = photon.travel_distance;

    let result = dist_to_exit_inner(db, photon, record);

    photon.location = orig_location;
    photon.travel_distance = orig_travel;
    result
}

fn dist_to_exit_inner(
    db: &BlockDb,
    photon: &mut Photon,
    record: &BlockRecord,
) -> (BlockExit, Position, f64) {
    let ring = &db.rings[record.ring];
    let ring_minus = ring.z_low();
    let ring_plus = ring.z_high();

    let mut p1 = photon.location.transaxial();
    let mut valid_edges = [true; 4];

    let placement = geom2d::point_vs_rect(p1, &record.rect);

    if placement == Placement::Outside {
        // normally called only on or within the block; project to it first
        let Some((its_ring, its_zone)) = db
            .get_zone(&photon.location, None, None)
            .or_else(|| {
                if proj_across_gap(db, photon) {
                    db.get_zone(&photon.location, None, None)
                } else {
                    None
                }
            })
        else {
            return (BlockExit::Failed, photon.location, 0.0);
        };

        match next_block(db, photon, its_ring, its_zone, None) {
            Some(hit) if (hit.ring, hit.block) == (record.ring, record.block) => {
                p1 = photon.location.transaxial();
            }
            _ => {
                // could not project to the requested block
                return (BlockExit::Failed, photon.location, 0.0);
            }
        }
    }

    if placement != Placement::Inside {
        // determine which edges the photon sits on; those cannot be exits
        for (e, valid) in valid_edges.iter_mut().enumerate() {
            let (e1, e2) = record.rect.edge(e);
            let edge_line = geom2d::normal_line(e1, e2);
            if edge_line.signed_distance(p1).abs() < 1e-7 {
                *valid = false;
            }
        }
    }

    if (1.0 - photon.direction.cz.abs()) <= AXIAL_COSINE_DEFECT {
        // pure axial motion: straight to the ring face
        let (z, dist) = if photon.direction.cz > 0.0 {
            (ring_plus, ring_plus - photon.location.z)
        } else {
            (ring_minus, photon.location.z - ring_minus)
        };
        return (BlockExit::Side, Position::new(p1.x, p1.y, z), dist);
    }

    let p2 = Point2::new(
        VERY_LONG_SEGMENT.mul_add(photon.direction.cx, p1.x),
        VERY_LONG_SEGMENT.mul_add(photon.direction.cy, p1.y),
    );
    let seg_line = geom2d::normal_line(p1, p2);
    let sine_z2 = photon.direction.cz.mul_add(-photon.direction.cz, 1.0);

    let edge_hit = |e: usize| -> (f64, f64, f64) {
        let (e1, e2) = record.rect.edge(e);
        let edge_line = geom2d::normal_line(e1, e2);
        let det = seg_line.cos.mul_add(edge_line.sin, -(edge_line.cos * seg_line.sin));
        let hit_x = seg_line.sin.mul_add(edge_line.dist, -(edge_line.sin * seg_line.dist)) / det;
        let hit_y = edge_line.cos.mul_add(seg_line.dist, -(seg_line.cos * edge_line.dist)) / det;
        let side_dist2 = (hit_x - p1.x).powi(2) + (hit_y - p1.y).powi(2);
        (hit_x, hit_y, (side_dist2 / sine_z2).sqrt())
    };

    let mut hit: Option<(f64, f64, f64)> = None;
    let mut edge_bounce = true;
    for e in 0..4 {
        let (e1, e2) = record.rect.edge(e);
        if geom2d::segments_intersect(p1, p2, e1, e2) == Placement::Outside {
            continue;
        }
        if valid_edges[e] {
            edge_bounce = false;
            hit = Some(edge_hit(e));
            // only one forward side crossing matters
            break;
        }
    }

    if edge_bounce {
        // the photon crossed none of the edges it wasn't already on, so it
        // bounces outward off an edge: take the farthest on-edge hit
        for (e, valid) in valid_edges.iter().enumerate() {
            if !valid {
                let candidate = edge_hit(e);
                if hit.is_none_or(|(_, _, d)| candidate.2 > d) {
                    hit = Some(candidate);
                }
            }
        }
    }

    let Some((hit_x, hit_y, hit_distance)) = hit else {
        return (BlockExit::Failed, photon.location, 0.0);
    };
    if hit_distance < 0.0 {
        return (BlockExit::Failed, photon.location, 0.0);
    }

    let exit_z = photon.direction.cz.mul_add(hit_distance, photon.location.z);
    if exit_z < ring_minus {
        let dist = (ring_minus - photon.location.z) / photon.direction.cz;
        let exit = Position::new(
            photon.direction.cx.mul_add(dist, p1.x),
            photon.direction.cy.mul_add(dist, p1.y),
            ring_minus,
        );
        (BlockExit::PrevRing, exit, dist)
    } else if exit_z > ring_plus {
        let dist = (ring_plus - photon.location.z) / photon.direction.cz;
        let exit = Position::new(
            photon.direction.cx.mul_add(dist, p1.x),
            photon.direction.cy.mul_add(dist, p1.y),
            ring_plus,
        );
        (BlockExit::NextRing, exit, dist)
    } else {
        (
            BlockExit::Side,
            Position::new(hit_x, hit_y, exit_z),
            hit_distance,
        )
    }
}

/// Finds the next block the photon's path enters, moving the photon to its
/// face. Returns `None` when the photon exits the detector instead.
///
/// The photon must be inside a ring and outside every block. `exclude`
/// names a block being exited so it is not immediately re-entered.
pub fn next_block(
    db: &BlockDb,
    photon: &mut Photon,
    start_ring: usize,
    start_zone: usize,
    exclude: Option<(usize, usize)>,
) -> Option<BlockHit> {
    let mut its_ring = start_ring;
    let mut its_zone = start_zone;
    let mut excluded = exclude;

    loop {
        if its_ring >= db.rings.len() {
            return None;
        }

        let ring = &db.rings[its_ring];
        let neg_ring_z = ring.z_low();
        let pos_ring_z = ring.z_high();

        let mut event;
        let mut shortest;
        let mut proj_position;

        let inner_hit =
            cylinder::hit_inner_cylinder(&db.inner_cylinder, &photon.location, photon.direction);

        if let Some((inner_pos, inner_dist)) = inner_hit {
            event = RingEvent::InnerCyl;
            shortest = inner_dist;
            proj_position = inner_pos;

            // a ring face may come first
            if proj_position.z > pos_ring_z {
                event = RingEvent::NextRing;
                shortest = (pos_ring_z - photon.location.z) / photon.direction.cz;
                proj_position = photon.location.along(photon.direction, shortest);
                proj_position.z = pos_ring_z;
            } else if proj_position.z < neg_ring_z {
                event = RingEvent::PrevRing;
                shortest = (neg_ring_z - photon.location.z) / photon.direction.cz;
                proj_position = photon.location.along(photon.direction, shortest);
                proj_position.z = neg_ring_z;
            }
        } else {
            let outer = Cylinder::radial_only(db.outer_radius);
            let outer_hit =
                cylinder::project_to_cylinder(&photon.location, photon.direction, &outer)
                    .filter(|_| db.in_outer_cylinder(photon.location.transaxial()));

            match outer_hit {
                None => {
                    // leaves through a cylinder end
                    event = if photon.direction.cz > 0.0 {
                        RingEvent::NextRing
                    } else {
                        RingEvent::PrevRing
                    };
                    let target = if event == RingEvent::NextRing {
                        pos_ring_z
                    } else {
                        neg_ring_z
                    };
                    shortest = (target - photon.location.z) / photon.direction.cz;
                    proj_position = photon.location.along(photon.direction, shortest);
                    proj_position.z = target;
                }
                Some((outer_pos, outer_dist)) => {
                    if outer_pos.z > pos_ring_z {
                        event = RingEvent::NextRing;
                        shortest = (pos_ring_z - photon.location.z) / photon.direction.cz;
                        proj_position = photon.location.along(photon.direction, shortest);
                        proj_position.z = pos_ring_z;
                    } else if outer_pos.z < neg_ring_z {
                        event = RingEvent::PrevRing;
                        shortest = (neg_ring_z - photon.location.z) / photon.direction.cz;
                        proj_position = photon.location.along(photon.direction, shortest);
                        proj_position.z = neg_ring_z;
                    } else {
                        event = RingEvent::OuterCyl;
                        shortest = outer_dist;
                        proj_position = outer_pos;
                    }
                }
            }
        }

        // a zone boundary may be closer still
        if let Some((zone_event, zone_pos, zone_dist)) =
            cross_zone_bounds(db, photon, its_ring, its_zone)
        {
            if zone_dist < shortest {
                event = zone_event;
                shortest = zone_dist;
                proj_position = zone_pos;
            }
        }

        // any block in the current zone beats all of the above
        let mut hit_block = None;
        for &slot in db.zone_slots(its_ring, its_zone) {
            let candidate = db.record(its_ring, slot as usize);
            if excluded == Some((candidate.ring, candidate.block)) {
                continue;
            }
            if let Some((block_dist, block_point)) =
                calc_distance_to_block(db, candidate, &photon.location, photon.direction)
            {
                if block_dist < shortest {
                    event = RingEvent::Block;
                    shortest = block_dist;
                    proj_position = block_point;
                    hit_block = Some(candidate.block);
                }
            }
        }

        match event {
            RingEvent::Block => {
                photon.move_to(proj_position, shortest);
                return Some(BlockHit {
                    ring: its_ring,
                    zone: its_zone,
                    block: hit_block.unwrap(),
                });
            }
            RingEvent::NextRing | RingEvent::PrevRing => {
                let new_ring = if event == RingEvent::NextRing {
                    if its_ring + 1 >= db.rings.len() {
                        return None;
                    }
                    its_ring + 1
                } else {
                    if its_ring == 0 {
                        return None;
                    }
                    its_ring - 1
                };

                // project across the ring gap
                let next_z = if event == RingEvent::NextRing {
                    db.rings[new_ring].z_low()
                } else {
                    db.rings[new_ring].z_high()
                };
                proj_axially(photon, next_z);

                let p = photon.location.transaxial();
                if !db.in_outer_cylinder(p) {
                    return None;
                }
                if db.in_inner_cylinder(p) {
                    return None;
                }

                let (r, z) = db.get_zone(&photon.location, Some(new_ring), Some(its_zone))?;
                its_ring = r;
                its_zone = z;
                excluded = None;
            }
            RingEvent::NextZone | RingEvent::PrevZone => {
                photon.move_to(proj_position, shortest);
                its_zone = if event == RingEvent::NextZone {
                    (its_zone + 1) % db.num_zones()
                } else {
                    (its_zone + db.num_zones() - 1) % db.num_zones()
                };
                excluded = None;
            }
            RingEvent::OutEnd | RingEvent::OuterCyl | RingEvent::InnerCyl => {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_db::BlockDb;
    use crate::fixtures;
    use crate::photon::{Direction, Photon};
    use float_cmp::assert_approx_eq;

    fn db() -> BlockDb {
        BlockDb::build(&fixtures::ring_of_blocks(8), 30.0).unwrap()
    }

    fn photon_at(pos: Position, dir: Direction) -> Photon {
        Photon::new(1, pos, dir, 511.0, 1.0)
    }

    #[test]
    fn axial_projection_moves_in_z() {
        let mut photon = photon_at(
            Position::new(1.0, 0.0, 0.0),
            Direction::new(0.0, 0.6, 0.8),
        );
        assert!(proj_axially(&mut photon, 4.0));
        assert_approx_eq!(f64, photon.location.z, 4.0, ulps = 2);
        assert_approx_eq!(f64, photon.location.y, 3.0, ulps = 4);
        assert_approx_eq!(f64, photon.travel_distance, 5.0, ulps = 4);

        let mut flat = photon_at(Position::new(1.0, 0.0, 0.0), Direction::new(0.0, 1.0, 0.0));
        assert!(!proj_axially(&mut flat, 4.0));
    }

    #[test]
    fn next_block_straight_at_block_zero() {
        let db = db();
        // start on the inner cylinder, heading straight at block 0
        let mut photon = photon_at(
            Position::new(30.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
        );
        let (ring, zone) = db.get_zone(&photon.location, None, None).unwrap();
        let hit = next_block(&db, &mut photon, ring, zone, None).unwrap();
        assert_eq!(hit.ring, 0);
        assert_eq!(hit.block, 0);
        assert_approx_eq!(f64, photon.location.x, 40.0, epsilon = 1e-9);
        assert_approx_eq!(f64, photon.location.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn next_block_crossing_zones() {
        let db = db();
        // start above the x-axis heading clockwise toward the block at
        // -45 degrees, crossing the 0-degree zone boundary on the way
        let start = Position::new(33.0, 8.0, 0.0);
        let target = Position::new(40.0 * 0.7071, -40.0 * 0.7071, 0.0);
        let dx = target.x - start.x;
        let dy = target.y - start.y;
        let norm = dx.hypot(dy);
        let mut photon = photon_at(start, Direction::new(dx / norm, dy / norm, 0.0));

        let (ring, zone) = db.get_zone(&photon.location, None, None).unwrap();
        let hit = next_block(&db, &mut photon, ring, zone, None).unwrap();
        assert_eq!(hit.ring, 0);
        assert_eq!(hit.block, 7);
    }

    #[test]
    fn outward_ray_between_blocks_exits() {
        let db = db();
        // aim outward halfway between block 0 (0 deg) and block 1 (45 deg)
        let angle = 22.5_f64.to_radians();
        let mut photon = photon_at(
            Position::new(36.0 * angle.cos(), 36.0 * angle.sin(), 0.0),
            Direction::new(angle.cos(), angle.sin(), 0.0),
        );
        let (ring, zone) = db.get_zone(&photon.location, None, None).unwrap();
        assert!(next_block(&db, &mut photon, ring, zone, None).is_none());
    }

    #[test]
    fn inward_ray_into_inner_cylinder_exits() {
        let db = db();
        let angle = 22.5_f64.to_radians();
        let mut photon = photon_at(
            Position::new(36.0 * angle.cos(), 36.0 * angle.sin(), 0.0),
            Direction::new(-angle.cos(), -angle.sin(), 0.0),
        );
        let (ring, zone) = db.get_zone(&photon.location, None, None).unwrap();
        assert!(next_block(&db, &mut photon, ring, zone, None).is_none());
    }

    #[test]
    fn distance_to_block_from_inside_is_zero() {
        let db = db();
        let record = db.record(0, 0);
        let inside = Position::new(41.0, 0.0, 0.0);
        let (dist, hit) =
            calc_distance_to_block(&db, record, &inside, Direction::new(1.0, 0.0, 0.0)).unwrap();
        assert_approx_eq!(f64, dist, 0.0, ulps = 2);
        assert_eq!(hit, inside);
    }

    #[test]
    fn distance_to_block_across_the_ring() {
        let db = db();
        let record = db.record(0, 0);
        let start = Position::new(30.0, 0.0, 0.0);
        let (dist, hit) =
            calc_distance_to_block(&db, record, &start, Direction::new(1.0, 0.0, 0.0)).unwrap();
        assert_approx_eq!(f64, dist, 10.0, epsilon = 1e-9);
        assert_approx_eq!(f64, hit.x, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn boundary_outward_photon_misses() {
        let db = db();
        let record = db.record(0, 0);
        // on the inner face of block 0, heading back toward the axis
        let on_face = Position::new(40.0, 0.0, 0.0);
        assert!(
            calc_distance_to_block(&db, record, &on_face, Direction::new(-1.0, 0.0, 0.0))
                .is_none()
        );
        // heading inward instead
        assert!(
            calc_distance_to_block(&db, record, &on_face, Direction::new(1.0, 0.0, 0.0))
                .is_some()
        );
    }

    #[test]
    fn exit_through_the_far_face() {
        let db = db();
        let record = db.record(0, 0);
        let mut photon = photon_at(
            Position::new(40.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
        );
        let (exit, point, dist) = dist_to_exit(&db, &mut photon, record);
        assert_eq!(exit, BlockExit::Side);
        assert_approx_eq!(f64, dist, 2.0, epsilon = 1e-7);
        assert_approx_eq!(f64, point.x, 42.0, epsilon = 1e-7);
        // the photon itself is restored
        assert_approx_eq!(f64, photon.location.x, 40.0, ulps = 2);
    }

    #[test]
    fn exit_axially_through_the_ring_face() {
        let db = db();
        let record = db.record(0, 0);
        let mut photon = photon_at(
            Position::new(41.0, 0.0, 1.0),
            Direction::new(0.0, 0.0, 1.0),
        );
        let (exit, point, dist) = dist_to_exit(&db, &mut photon, record);
        assert_eq!(exit, BlockExit::Side);
        assert_approx_eq!(f64, point.z, 5.0, ulps = 2);
        assert_approx_eq!(f64, dist, 4.0, ulps = 2);
    }

    #[test]
    fn zone_crossing_has_sane_distance() {
        let db = db();
        // counterclockwise motion from inside zone 0 toward the 90 degree
        // boundary (the positive y-axis)
        let photon = photon_at(
            Position::new(5.0, 30.0, 0.0),
            Direction::new(-1.0, 0.0, 0.0),
        );
        let (ring, zone) = db.get_zone(&photon.location, None, None).unwrap();
        let (event, pos, dist) = cross_zone_bounds(&db, &photon, ring, zone).unwrap();
        assert_eq!(event, RingEvent::NextZone);
        assert_approx_eq!(f64, dist, 5.0, epsilon = 1e-6);
        assert_approx_eq!(f64, pos.x, 0.0, epsilon = 1e-6);
        assert_approx_eq!(f64, pos.y, 30.0, epsilon = 1e-6);

        // radial motion never crosses a zone boundary
        let radial = photon_at(
            Position::new(36.0, 0.0, 0.0),
            Direction::new(1.0, 0.0, 0.0),
        );
        let (ring, zone) = db.get_zone(&radial.location, None, None).unwrap();
        assert!(cross_zone_bounds(&db, &radial, ring, zone).is_none());
    }
}
