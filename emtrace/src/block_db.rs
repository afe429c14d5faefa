//! Static database of detector blocks: the per-ring block descriptors, the
//! derived corner/arc tables, the angular zone partition, and the load-time
//! geometry validation.
//!
//! Blocks are owned by their ring (one vector per ring); the zone index
//! stores block indices, never pointers, so the whole database is a plain
//! value type.

use crate::consts::GEOM_EPSILON;
use crate::cylinder::{self, Cylinder};
use crate::error::{Error, Result};
use crate::geom2d::{self, Placement, Point2, Rect2};
use crate::params::{BlockTomoParams, PositionAlgorithm};
use crate::photon::{Direction, Position};
use std::cmp::Ordering;

/// Largest number of blocks a zone may hold before it is split.
pub const MAX_BLOCKS_PER_ZONE: usize = 15;

/// Hard cap on the number of zones per ring.
pub const MAX_ZONES: usize = 300;

/// A direction-cosine pair marking an angle around the tomograph axis.
#[derive(Clone, Copy, Debug)]
pub struct AngleSpec {
    /// Cosine of the angle.
    pub cos: f64,
    /// Sine of the angle.
    pub sin: f64,
}

impl AngleSpec {
    fn from_theta(theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self { cos, sin }
    }

    fn theta(&self) -> f64 {
        let t = self.cos.acos();
        if self.sin < 0.0 {
            std::f64::consts::TAU - t
        } else {
            t
        }
    }

    /// Counterclockwise comparison against another angle.
    #[must_use]
    pub fn cmp_to(&self, other: &Self) -> Ordering {
        geom2d::dir_cos_cmp(self.cos, self.sin, other.cos, other.sin)
    }
}

/// One material element of a block layer.
#[derive(Clone, Copy, Debug)]
pub struct BlockElement {
    /// Material index.
    pub material: usize,
    /// Whether deposits here contribute to the centroid.
    pub is_active: bool,
    /// Id of this crystal within its block (active elements only).
    pub crystal_in_block: i64,
    /// Id of this crystal within the whole tomograph (active elements only).
    pub crystal_in_tomo: i64,
}

/// One x-layer of a block with its y/z element grid.
#[derive(Clone, Debug)]
pub struct BlockLayer {
    /// Lesser x face in block coordinates (cm).
    pub inner_x: f64,
    /// Greater x face in block coordinates (cm).
    pub outer_x: f64,
    /// Ascending y partition values.
    pub y_changes: Vec<f64>,
    /// Ascending z partition values.
    pub z_changes: Vec<f64>,
    /// Elements, `element = z_index * (y_changes + 1) + y_index`.
    pub elements: Vec<BlockElement>,
    /// Whether any element of this layer is active.
    pub has_active: bool,
}

impl BlockLayer {
    /// Number of elements across y.
    #[must_use]
    pub fn y_count(&self) -> usize {
        self.y_changes.len() + 1
    }
}

/// A block: local geometry plus its placement-derived transforms.
#[derive(Clone, Debug)]
pub struct BlockInfo {
    /// Local bounding box.
    pub x_min: f64,
    /// Local bounding box.
    pub x_max: f64,
    /// Local bounding box.
    pub y_min: f64,
    /// Local bounding box.
    pub y_max: f64,
    /// Local bounding box.
    pub z_min: f64,
    /// Local bounding box.
    pub z_max: f64,
    /// Block-local reference point.
    pub x_ref: f64,
    /// Block-local reference point.
    pub y_ref: f64,
    /// Block-local reference point.
    pub z_ref: f64,
    /// Reference point position in tomograph coordinates.
    pub x_position_tomo: f64,
    /// Reference point position in tomograph coordinates.
    pub y_position_tomo: f64,
    /// Reference point position in tomograph coordinates.
    pub z_position_tomo: f64,
    /// Cosine of the block-face rotation angle.
    pub cos_block_face: f64,
    /// Sine of the block-face rotation angle.
    pub sin_block_face: f64,
    /// Layers in ascending x order.
    pub layers: Vec<BlockLayer>,
}

impl BlockInfo {
    /// Whether the block degenerates to a single homogeneous element.
    #[must_use]
    pub fn is_single_element(&self) -> bool {
        self.layers.len() == 1 && self.layers[0].elements.len() == 1
    }

    /// Tomograph point to block-local coordinates.
    #[must_use]
    pub fn tomo_to_block(&self, tomo: &Position) -> Position {
        let xt = tomo.x - self.x_position_tomo;
        let yt = tomo.y - self.y_position_tomo;
        let zt = tomo.z - self.z_position_tomo;
        Position::new(
            self.cos_block_face.mul_add(xt, self.sin_block_face * yt) + self.x_ref,
            self.cos_block_face.mul_add(yt, -(self.sin_block_face * xt)) + self.y_ref,
            zt + self.z_ref,
        )
    }

    /// Block-local point to tomograph coordinates.
    #[must_use]
    pub fn block_to_tomo(&self, block: &Position) -> Position {
        let xb = block.x - self.x_ref;
        let yb = block.y - self.y_ref;
        let zb = block.z - self.z_ref;
        Position::new(
            self.cos_block_face.mul_add(xb, -(self.sin_block_face * yb)) + self.x_position_tomo,
            self.cos_block_face.mul_add(yb, self.sin_block_face * xb) + self.y_position_tomo,
            zb + self.z_position_tomo,
        )
    }

    /// Tomograph direction to block-local direction (rotation only).
    #[must_use]
    pub fn tomo_to_block_dir(&self, dir: Direction) -> Direction {
        Direction::new(
            dir.cx.mul_add(self.cos_block_face, dir.cy * self.sin_block_face),
            dir.cy.mul_add(self.cos_block_face, -(dir.cx * self.sin_block_face)),
            dir.cz,
        )
    }

    /// Block-local direction to tomograph direction (rotation only).
    #[must_use]
    pub fn block_to_tomo_dir(&self, dir: Direction) -> Direction {
        Direction::new(
            dir.cx.mul_add(self.cos_block_face, -(dir.cy * self.sin_block_face)),
            dir.cy.mul_add(self.cos_block_face, dir.cx * self.sin_block_face),
            dir.cz,
        )
    }

    /// Clamps a block-local position onto the bounding box, correcting
    /// transform round-off for points known to be inside the block.
    #[must_use]
    pub fn clamp_to_bounds(&self, pos: &Position) -> Position {
        Position::new(
            pos.x.clamp(self.x_min, self.x_max),
            pos.y.clamp(self.y_min, self.y_max),
            pos.z.clamp(self.z_min, self.z_max),
        )
    }
}

/// One axial ring of the block detector.
#[derive(Clone, Debug)]
pub struct BlockRing {
    /// Lower axial bound before shifting (cm).
    pub min_z: f64,
    /// Upper axial bound before shifting (cm).
    pub max_z: f64,
    /// Axial shift applied to the whole ring (cm).
    pub axial_shift: f64,
    /// Inner bound along x (cm).
    pub x_inner_radius: f64,
    /// Inner bound along y (cm).
    pub y_inner_radius: f64,
    /// Outer bound along x (cm).
    pub x_outer_radius: f64,
    /// Outer bound along y (cm).
    pub y_outer_radius: f64,
    /// The blocks of this ring.
    pub blocks: Vec<BlockInfo>,
}

impl BlockRing {
    /// Shifted lower axial bound.
    #[must_use]
    pub fn z_low(&self) -> f64 {
        self.min_z + self.axial_shift
    }

    /// Shifted upper axial bound.
    #[must_use]
    pub fn z_high(&self) -> f64 {
        self.max_z + self.axial_shift
    }
}

/// Derived per-block data: the 2-D rectangle in tomograph coordinates, the
/// axial range, and the subtended arc.
#[derive(Clone, Debug)]
pub struct BlockRecord {
    /// Ring the block belongs to.
    pub ring: usize,
    /// Block index within the ring.
    pub block: usize,
    /// The block footprint in the transaxial plane.
    pub rect: Rect2,
    /// Axial extent in tomograph coordinates.
    pub z_min: f64,
    /// Axial extent in tomograph coordinates.
    pub z_max: f64,
    /// Lesser boundary of the subtended arc.
    pub min_angle: AngleSpec,
    /// Greater boundary of the subtended arc.
    pub max_angle: AngleSpec,
}

/// The full block database.
pub struct BlockDb {
    /// Ring descriptors (owning the blocks).
    pub rings: Vec<BlockRing>,
    /// Derived records, one vector per ring.
    pub records: Vec<Vec<BlockRecord>>,
    /// Zone boundaries (lesser edges), shared by all rings.
    zone_bounds: Vec<AngleSpec>,
    /// Per `(ring, zone)`, the indices of the blocks whose arcs intersect
    /// the zone.
    zone_blocks: Vec<Vec<u32>>,
    /// The collimator cylinder bounding the detector from the inside.
    pub inner_cylinder: Cylinder,
    /// Radius of the outer cylinder guaranteed to contain every block.
    pub outer_radius: f64,
    /// The same radius, squared.
    pub outer_radius_sqrd: f64,
    /// How detected positions are reported.
    pub position_algorithm: PositionAlgorithm,
}

impl BlockDb {
    /// Builds and validates the database from deck parameters.
    ///
    /// # Errors
    ///
    /// Returns a geometry error when a block violates its ring bounds,
    /// dips into the collimator cylinder, or overlaps another block.
    pub fn build(params: &BlockTomoParams, collimator_outer_radius: f64) -> Result<Self> {
        let rings = build_rings(params);
        let records = make_rb_records(&rings);
        let inner_cylinder = Cylinder::radial_only(collimator_outer_radius);

        let outer_radius_sqrd = self_consistency_check(&rings, &records, &inner_cylinder)?;
        overlap_check(&records)?;

        let (zone_bounds, zone_blocks) = divide_zones(&records, rings.len());

        Ok(Self {
            rings,
            records,
            zone_bounds,
            zone_blocks,
            inner_cylinder,
            outer_radius: outer_radius_sqrd.sqrt(),
            outer_radius_sqrd,
            position_algorithm: params.position_algorithm,
        })
    }

    /// Number of zones each ring is divided into.
    #[must_use]
    pub fn num_zones(&self) -> usize {
        self.zone_bounds.len()
    }

    /// The angular range of a zone as (lesser, greater) boundaries.
    #[must_use]
    pub fn zone_range(&self, zone: usize) -> (AngleSpec, AngleSpec) {
        (
            self.zone_bounds[zone],
            self.zone_bounds[(zone + 1) % self.zone_bounds.len()],
        )
    }

    /// The block indices overlapping `(ring, zone)`.
    #[must_use]
    pub fn zone_slots(&self, ring: usize, zone: usize) -> &[u32] {
        &self.zone_blocks[ring * self.num_zones() + zone]
    }

    /// The derived record of block `(ring, block)`.
    #[must_use]
    pub fn record(&self, ring: usize, block: usize) -> &BlockRecord {
        &self.records[ring][block]
    }

    /// The descriptor of block `(ring, block)`.
    #[must_use]
    pub fn info(&self, ring: usize, block: usize) -> &BlockInfo {
        &self.rings[ring].blocks[block]
    }

    /// Whether `p` is radially inside the collimator cylinder.
    #[must_use]
    pub fn in_inner_cylinder(&self, p: Point2) -> bool {
        self.inner_cylinder.contains_2d(p)
    }

    /// Whether `p` is radially inside the outer detector cylinder.
    #[must_use]
    pub fn in_outer_cylinder(&self, p: Point2) -> bool {
        p.x.mul_add(p.x, p.y * p.y) < self.outer_radius_sqrd
    }

    /// Finds the ring and zone containing `position`, scanning outward from
    /// the hints when provided. `None` when the axial position falls in no
    /// ring.
    #[must_use]
    pub fn get_zone(
        &self,
        position: &Position,
        hint_ring: Option<usize>,
        hint_zone: Option<usize>,
    ) -> Option<(usize, usize)> {
        let ring = self.find_ring(position.z, hint_ring)?;

        // angular direction of the position from the origin
        let (cos, sin) = geom2d::dir_cosines(Point2::new(0.0, 0.0), position.transaxial());
        let its_angle = AngleSpec { cos, sin };

        let num_zones = self.num_zones();
        let in_zone = |z: usize| {
            let (low, high) = self.zone_range(z);
            its_angle.cmp_to(&low) != Ordering::Less && its_angle.cmp_to(&high) != Ordering::Greater
        };

        let (mut z, delta) = match hint_zone {
            Some(hint) if hint < num_zones => {
                if in_zone(hint) {
                    return Some((ring, hint));
                }
                let (low, _) = self.zone_range(hint);
                if its_angle.cmp_to(&low) == Ordering::Less {
                    ((hint + num_zones - 1) % num_zones, num_zones - 1)
                } else {
                    ((hint + 1) % num_zones, 1)
                }
            }
            _ => (0, 1),
        };

        for _ in 0..num_zones {
            if in_zone(z) {
                return Some((ring, z));
            }
            z = (z + delta) % num_zones;
        }

        // zones tile the full circle, so the position's own zone must match
        Some((ring, z))
    }

    fn find_ring(&self, z: f64, hint: Option<usize>) -> Option<usize> {
        let in_ring = |r: usize| (self.rings[r].z_low() <= z) && (z <= self.rings[r].z_high());

        if let Some(r) = hint {
            if r < self.rings.len() {
                if in_ring(r) {
                    return Some(r);
                }
                // scan outward from the hint in the indicated direction
                if z > self.rings[r].z_high() {
                    return (r + 1..self.rings.len()).find(|&i| in_ring(i));
                }
                return (0..r).rev().find(|&i| in_ring(i));
            }
        }

        (0..self.rings.len()).find(|&i| in_ring(i))
    }
}

fn build_rings(params: &BlockTomoParams) -> Vec<BlockRing> {
    let mut next_tomo_crystal = 0_i64;

    params
        .rings
        .iter()
        .map(|ring| {
            let ring_rotation = ring.transaxial_rotation_deg.to_radians();
            let blocks = ring
                .blocks
                .iter()
                .map(|placement| {
                    let alpha =
                        placement.angular_position_deg.to_radians() + ring_rotation;
                    let face = alpha + placement.transaxial_orientation_deg.to_radians();
                    let (sin_face, cos_face) = face.sin_cos();

                    let mut next_block_crystal = 0_i64;
                    let layers = placement
                        .shape
                        .layers
                        .iter()
                        .map(|layer| {
                            let elements = layer
                                .elements
                                .iter()
                                .map(|element| {
                                    let ids = if element.is_active {
                                        let ids = (next_block_crystal, next_tomo_crystal);
                                        next_block_crystal += 1;
                                        next_tomo_crystal += 1;
                                        ids
                                    } else {
                                        (-1, -1)
                                    };
                                    BlockElement {
                                        material: element.material,
                                        is_active: element.is_active,
                                        crystal_in_block: ids.0,
                                        crystal_in_tomo: ids.1,
                                    }
                                })
                                .collect::<Vec<_>>();
                            BlockLayer {
                                inner_x: layer.inner_x,
                                outer_x: layer.outer_x,
                                y_changes: layer.y_changes.clone(),
                                z_changes: layer.z_changes.clone(),
                                has_active: elements.iter().any(|e| e.is_active),
                                elements,
                            }
                        })
                        .collect();

                    BlockInfo {
                        x_min: placement.shape.x_bounds[0],
                        x_max: placement.shape.x_bounds[1],
                        y_min: placement.shape.y_bounds[0],
                        y_max: placement.shape.y_bounds[1],
                        z_min: placement.shape.z_bounds[0],
                        z_max: placement.shape.z_bounds[1],
                        x_ref: placement.shape.reference[0],
                        y_ref: placement.shape.reference[1],
                        z_ref: placement.shape.reference[2],
                        x_position_tomo: placement.radial_position * alpha.cos(),
                        y_position_tomo: placement.radial_position * alpha.sin(),
                        z_position_tomo: placement.z_position + ring.axial_shift,
                        cos_block_face: cos_face,
                        sin_block_face: sin_face,
                        layers,
                    }
                })
                .collect();

            BlockRing {
                min_z: ring.min_z,
                max_z: ring.max_z,
                axial_shift: ring.axial_shift,
                x_inner_radius: ring.x_inner_radius,
                y_inner_radius: ring.y_inner_radius,
                x_outer_radius: ring.x_outer_radius,
                y_outer_radius: ring.y_outer_radius,
                blocks,
            }
        })
        .collect()
}

fn make_rb_records(rings: &[BlockRing]) -> Vec<Vec<BlockRecord>> {
    let origin = Point2::new(0.0, 0.0);

    rings
        .iter()
        .enumerate()
        .map(|(r, ring)| {
            ring.blocks
                .iter()
                .enumerate()
                .map(|(b, info)| {
                    // four corners of the local box, rotated into the
                    // tomograph frame
                    let local_corners = [
                        (info.x_min, info.y_min),
                        (info.x_max, info.y_min),
                        (info.x_max, info.y_max),
                        (info.x_min, info.y_max),
                    ];
                    let mut corners = [Point2::default(); 4];
                    for (corner, &(x, y)) in corners.iter_mut().zip(&local_corners) {
                        let tomo =
                            info.block_to_tomo(&Position::new(x, y, info.z_min));
                        *corner = tomo.transaxial();
                    }
                    let z_min = info.block_to_tomo(&Position::new(0.0, 0.0, info.z_min)).z;
                    let z_max = info.block_to_tomo(&Position::new(0.0, 0.0, info.z_max)).z;

                    // blocks lie at positive distance from the origin, so
                    // their subtended arcs are below pi and the angular
                    // comparisons are valid
                    let (cos, sin) = geom2d::dir_cosines(origin, corners[0]);
                    let mut min_angle = AngleSpec { cos, sin };
                    let mut max_angle = min_angle;
                    for corner in &corners[1..] {
                        let (cos, sin) = geom2d::dir_cosines(origin, *corner);
                        let candidate = AngleSpec { cos, sin };
                        if candidate.cmp_to(&min_angle) == Ordering::Less {
                            min_angle = candidate;
                        } else if candidate.cmp_to(&max_angle) == Ordering::Greater {
                            max_angle = candidate;
                        }
                    }

                    BlockRecord {
                        ring: r,
                        block: b,
                        rect: Rect2 { corners },
                        z_min,
                        z_max,
                        min_angle,
                        max_angle,
                    }
                })
                .collect()
        })
        .collect()
}

/// Checks ring bounds and collimator clearance for every block; returns the
/// squared outer-cylinder radius.
fn self_consistency_check(
    rings: &[BlockRing],
    records: &[Vec<BlockRecord>],
    inner_cylinder: &Cylinder,
) -> Result<f64> {
    let mut max_dist_sqrd = 0.0_f64;

    for (r, ring) in rings.iter().enumerate() {
        let in_ring_cyl = Cylinder::radial_only(ring.x_inner_radius.min(ring.y_inner_radius));
        let out_ring_cyl = Cylinder::radial_only(ring.x_outer_radius.max(ring.y_outer_radius));

        for record in &records[r] {
            let b = record.block;
            if record.z_min < ring.z_low() - GEOM_EPSILON
                || record.z_max > ring.z_high() + GEOM_EPSILON
            {
                return Err(Error::Geometry(format!(
                    "block {b} in ring {r} is outside its axial bounds"
                )));
            }

            // innermost and outermost corners decide the radial bound checks
            let dist_sqrd = |p: Point2| p.x.mul_add(p.x, p.y * p.y);
            let (min_corner, _) = record
                .rect
                .corners
                .iter()
                .enumerate()
                .min_by(|a, b| dist_sqrd(*a.1).total_cmp(&dist_sqrd(*b.1)))
                .map(|(i, p)| (*p, i))
                .unwrap();
            let max_corner_dist_sqrd = record
                .rect
                .corners
                .iter()
                .map(|&p| dist_sqrd(p))
                .fold(0.0_f64, f64::max);
            let max_corner = *record
                .rect
                .corners
                .iter()
                .max_by(|a, b| dist_sqrd(**a).total_cmp(&dist_sqrd(**b)))
                .unwrap();

            if in_ring_cyl.contains_2d(min_corner) {
                return Err(Error::Geometry(format!(
                    "block {b} in ring {r} has a corner inside its inner bound"
                )));
            }
            if inner_cylinder.contains_2d(min_corner) {
                return Err(Error::Geometry(format!(
                    "block {b} in ring {r} has a corner inside the collimator"
                )));
            }

            // the two edges adjacent to the innermost corner may still cut
            // the circle even with all corners outside
            let min_index = record
                .rect
                .corners
                .iter()
                .position(|&p| p == min_corner)
                .unwrap();
            for adjacent in [(min_index + 1) % 4, (min_index + 3) % 4] {
                let other = record.rect.corners[adjacent];
                if cylinder::segment_crosses_circle(&in_ring_cyl, min_corner, other) {
                    return Err(Error::Geometry(format!(
                        "block {b} in ring {r} has an edge inside its inner bound"
                    )));
                }
                if cylinder::segment_crosses_circle(inner_cylinder, min_corner, other) {
                    return Err(Error::Geometry(format!(
                        "block {b} in ring {r} has an edge inside the collimator"
                    )));
                }
            }

            if !out_ring_cyl.contains_2d(max_corner) {
                return Err(Error::Geometry(format!(
                    "block {b} in ring {r} has a corner outside its outer bound"
                )));
            }

            max_dist_sqrd = max_dist_sqrd.max(max_corner_dist_sqrd);
        }
    }

    // guaranteed to contain every block with a little slack
    Ok(max_dist_sqrd + 1.0)
}

fn overlap_check(records: &[Vec<BlockRecord>]) -> Result<()> {
    for (r, ring_records) in records.iter().enumerate() {
        for (b, record) in ring_records.iter().enumerate() {
            for (i, other) in ring_records[..b].iter().enumerate() {
                if geom2d::rects_intersect(&record.rect, &other.rect) == Placement::Inside {
                    return Err(Error::Geometry(format!(
                        "block {b} intersects with block {i} in ring {r}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Whether a block's subtended arc overlaps the zone between two boundaries.
fn block_in_zone(record: &BlockRecord, low: &AngleSpec, high: &AngleSpec) -> bool {
    record.max_angle.cmp_to(low) == Ordering::Greater
        && record.min_angle.cmp_to(high) == Ordering::Less
}

/// Splits the rings into angular zones until no zone holds more than
/// [`MAX_BLOCKS_PER_ZONE`] blocks (or the zone cap is reached), then builds
/// the `(ring, zone)` slot lists.
fn divide_zones(
    records: &[Vec<BlockRecord>],
    num_rings: usize,
) -> (Vec<AngleSpec>, Vec<Vec<u32>>) {
    let mut bounds = vec![
        AngleSpec { cos: 1.0, sin: 0.0 },
        AngleSpec { cos: 0.0, sin: 1.0 },
        AngleSpec { cos: -1.0, sin: 0.0 },
        AngleSpec { cos: 0.0, sin: -1.0 },
    ];

    loop {
        let num_zones = bounds.len();
        let mut overcrowded = false;

        'rings: for ring_records in records {
            let mut counts = vec![0_usize; num_zones];
            for record in ring_records {
                for z in 0..num_zones {
                    let low = bounds[z];
                    let high = bounds[(z + 1) % num_zones];
                    if block_in_zone(record, &low, &high) {
                        counts[z] += 1;
                        if counts[z] > MAX_BLOCKS_PER_ZONE {
                            overcrowded = true;
                            break 'rings;
                        }
                    }
                }
            }
        }

        if !overcrowded || bounds.len() * 2 > MAX_ZONES {
            break;
        }

        // bisect every zone by angle and recount
        let mut split = Vec::with_capacity(bounds.len() * 2);
        for z in 0..bounds.len() {
            let low = bounds[z];
            let high = bounds[(z + 1) % bounds.len()];
            let theta_low = low.theta();
            let mut theta_high = high.theta();
            if theta_high <= theta_low {
                theta_high += std::f64::consts::TAU;
            }
            split.push(low);
            split.push(AngleSpec::from_theta(0.5 * (theta_low + theta_high)));
        }
        bounds = split;
    }

    // final pass: populate the (ring, zone) slot lists
    let num_zones = bounds.len();
    let mut zone_blocks = vec![Vec::new(); num_rings * num_zones];
    for (r, ring_records) in records.iter().enumerate() {
        for (b, record) in ring_records.iter().enumerate() {
            for z in 0..num_zones {
                let low = bounds[z];
                let high = bounds[(z + 1) % num_zones];
                if block_in_zone(record, &low, &high) {
                    zone_blocks[r * num_zones + z].push(b as u32);
                }
            }
        }
    }

    (bounds, zone_blocks)
}
