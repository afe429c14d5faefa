//! Right-circular cylinder geometry: surface projection, inner-cylinder hit
//! testing, and chord checks against the transaxial circle.

use crate::consts::UNBOUNDED_Z;
use crate::geom2d::{self, Point2};
use crate::photon::{Direction, Position};
use serde::{Deserialize, Serialize};

/// A right-circular cylinder with its axis parallel to z.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Cylinder {
    /// Radius (cm).
    pub radius: f64,
    /// Lower axial bound (cm).
    pub z_min: f64,
    /// Upper axial bound (cm).
    pub z_max: f64,
    /// Transaxial center x (cm).
    pub center_x: f64,
    /// Transaxial center y (cm).
    pub center_y: f64,
}

impl Cylinder {
    /// A cylinder centered on the tomograph axis with the given radius and
    /// axial range.
    #[must_use]
    pub const fn centered(radius: f64, z_min: f64, z_max: f64) -> Self {
        Self {
            radius,
            z_min,
            z_max,
            center_x: 0.0,
            center_y: 0.0,
        }
    }

    /// A cylinder bounded radially but effectively unbounded axially.
    #[must_use]
    pub const fn radial_only(radius: f64) -> Self {
        Self::centered(radius, -UNBOUNDED_Z, UNBOUNDED_Z)
    }

    /// Whether `p` lies strictly inside the cylinder wall (radially).
    #[must_use]
    pub fn contains_2d(&self, p: Point2) -> bool {
        let dx = p.x - self.center_x;
        let dy = p.y - self.center_y;
        dx * dx + dy * dy < self.radius * self.radius
    }

    /// Whether `z` lies within the axial range (exclusive at both ends).
    #[must_use]
    pub fn contains_axially(&self, z: f64) -> bool {
        (z > self.z_min) && (z < self.z_max)
    }
}

/// Both roots of the ray/cylinder-wall quadratic, ordered.
///
/// `None` when the ray is parallel to the wall in the transaxial plane or
/// the discriminant is negative.
fn wall_roots(pos: &Position, dir: Direction, cyl: &Cylinder) -> Option<(f64, f64)> {
    let a = dir.cz.mul_add(-dir.cz, 1.0);
    if a <= 0.0 {
        return None;
    }

    let xc = pos.x - cyl.center_x;
    let yc = pos.y - cyl.center_y;
    let b = 2.0 * (dir.cx * xc + dir.cy * yc);
    let c = cyl.radius.mul_add(-cyl.radius, xc * xc + yc * yc);

    let discriminant = b.mul_add(b, -4.0 * a * c);
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let min_root = (-b - sqrt_d) / (2.0 * a);
    let max_root = (-b + sqrt_d) / (2.0 * a);
    Some((min_root, max_root))
}

/// Projects a point along a unit direction onto the cylinder wall.
///
/// Returns the projected position and the distance to it, or `None` when the
/// direction is purely axial (`|cz| = 1`) or the forward ray never reaches
/// the wall. For a point inside the cylinder the positive root always
/// exists.
#[must_use]
pub fn project_to_cylinder(
    pos: &Position,
    dir: Direction,
    cyl: &Cylinder,
) -> Option<(Position, f64)> {
    if dir.cz.abs() == 1.0 {
        return None;
    }

    let (min_root, max_root) = wall_roots(pos, dir, cyl)?;
    let distance = if min_root > 0.0 {
        min_root
    } else if max_root > 0.0 {
        max_root
    } else {
        return None;
    };

    Some((pos.along(dir, distance), distance))
}

/// Distance along the ray to the inner cylinder, for a photon known to be
/// outside it. `None` when the forward ray misses the cylinder.
#[must_use]
pub fn inner_distance(pos: &Position, dir: Direction, cyl: &Cylinder) -> Option<f64> {
    let (min_root, max_root) = wall_roots(pos, dir, cyl)?;

    // an outward or tangent ray has no entering intersection
    if max_root < 0.0 || max_root.abs() < 1e-5 {
        return None;
    }

    Some(min_root)
}

/// 2-D ray/circle intersection distances in the transaxial plane.
///
/// `dir_2d` must be normalized in two dimensions. Returns the ordered signed
/// distances along the ray, or `None` for a miss.
#[must_use]
pub fn find_2d_intersection(p: Point2, dir_2d: (f64, f64), radius: f64) -> Option<(f64, f64)> {
    let b = 2.0 * (dir_2d.0 * p.x + dir_2d.1 * p.y);
    let c = radius.mul_add(-radius, p.x.mul_add(p.x, p.y * p.y));
    let discriminant = b.mul_add(b, -4.0 * c);
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    Some(((-b - sqrt_d) / 2.0, (-b + sqrt_d) / 2.0))
}

/// Whether the 2-D segment from `p1` to `p2` cuts into the circle of the
/// given cylinder; `p1` is assumed to be outside. A tangent contact, judged
/// by the chord-to-circle distance, is allowed.
#[must_use]
pub fn segment_crosses_circle(cyl: &Cylinder, p1: Point2, p2: Point2) -> bool {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let seg_length = dx.hypot(dy);
    let dir_2d = (dx / seg_length, dy / seg_length);

    let Some((d1, d2)) = find_2d_intersection(p1, dir_2d, cyl.radius) else {
        return false;
    };
    if d2 <= 0.0 {
        return false;
    }

    // the radius-relative sagitta of a chord is ~ c^2 / 8R^2; compare its
    // square root against a loose zero to allow tangent grazes
    if (0.353553391 * (d2 - d1) / cyl.radius).abs() < 1e-4 {
        return false;
    }

    d1 < seg_length
}

/// Tests whether a photon that is outside the inner cylinder will enter it,
/// and if so where.
///
/// The outward/inward decision uses the radial dot product; the hit point is
/// reconstructed from the closest-approach point of the 2-D path, with the
/// axial component recovered through `sin(z)`. Works for purely transaxial
/// photons (`cz = 0`) as well.
#[must_use]
pub fn hit_inner_cylinder(
    cyl: &Cylinder,
    pos: &Position,
    dir: Direction,
) -> Option<(Position, f64)> {
    // +1 outward, -1 inward, 0 perpendicular
    let radial_projection = dir.cx * pos.x + dir.cy * pos.y;
    if 1.0_f64.copysign(radial_projection) >= 0.0 {
        return None;
    }

    // closest approach of the 2-D path to the cylinder axis, via the normal
    // form of the line through the position along the direction
    let p1 = pos.transaxial();
    let p2 = Point2::new(pos.x + dir.cx, pos.y + dir.cy);
    let path_line = geom2d::normal_line(p1, p2);
    let min_dist = path_line.dist.abs();

    if min_dist > cyl.radius {
        return None;
    }

    let closest = Point2::new(-path_line.dist * path_line.cos, -path_line.dist * path_line.sin);
    let xy_travel = (pos.x - closest.x).hypot(pos.y - closest.y);
    let sin_z = dir.sin_z();
    let closest_point = Position::new(
        closest.x,
        closest.y,
        pos.z + xy_travel / sin_z * dir.cz,
    );

    let hit = if min_dist == cyl.radius {
        // just touches the wall
        closest_point
    } else {
        // project from the closest-approach point back toward the photon;
        // the reverse ray must cross the wall because the photon is outside
        let (projected, _) = project_to_cylinder(&closest_point, dir.reversed(), cyl)?;
        projected
    };

    let distance = pos.distance_to(&hit);
    Some((hit, distance))
}
