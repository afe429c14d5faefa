//! 2-D computational geometry for the transaxial plane.
//!
//! Everything in here works on exact coordinates with a fuzzy-equality
//! tolerance of [`GEOM_EPSILON`]; the predicates report boundary contact as a
//! distinct third state instead of folding it into either side.

use crate::consts::GEOM_EPSILON;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A point in the transaxial (x, y) plane.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Point2 {
    /// Transaxial x coordinate (cm).
    pub x: f64,
    /// Transaxial y coordinate (cm).
    pub y: f64,
}

impl Point2 {
    /// Creates a point from its coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A (not necessarily axis-aligned) rectangle given by its four corners in
/// cyclic order.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Rect2 {
    /// The corners, in cyclic order around the boundary.
    pub corners: [Point2; 4],
}

impl Rect2 {
    /// The edge from corner `e` to corner `e + 1` (cyclically).
    #[must_use]
    pub const fn edge(&self, e: usize) -> (Point2, Point2) {
        (self.corners[e], self.corners[(e + 1) % 4])
    }
}

/// Result of a containment or intersection test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placement {
    /// Disjoint.
    Outside,
    /// Contact only on a boundary (edge, endpoint, or corner).
    OnBound,
    /// Proper interior intersection.
    Inside,
}

/// Coefficients of the signed normal-form line equation
/// `cos * x + sin * y + dist = 0`.
///
/// "Signed" means `dist` is the negated distance of the line from the origin,
/// with the sign convention fixed by [`normal_line`].
#[derive(Clone, Copy, Debug)]
pub struct NormalLine {
    /// Normal direction cosine.
    pub cos: f64,
    /// Normal direction sine.
    pub sin: f64,
    /// Negated origin distance.
    pub dist: f64,
}

impl NormalLine {
    /// Signed distance of `p` from the line.
    #[must_use]
    pub fn signed_distance(&self, p: Point2) -> f64 {
        self.cos * p.x + self.sin * p.y + self.dist
    }
}

fn are_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < GEOM_EPSILON
}

/// Direction cosines of the line from `p1` to `p2`.
///
/// Two identical points give a line along the positive x-axis.
#[must_use]
pub fn dir_cosines(p1: Point2, p2: Point2) -> (f64, f64) {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let len = dx.hypot(dy);

    if len == 0.0 {
        (1.0, 0.0)
    } else {
        (dx / len, dy / len)
    }
}

/// Compares the angles of two direction-cosine pairs counterclockwise over
/// `[0, 2pi)`.
///
/// The comparison is only meaningful for angles separated by less than pi;
/// lines separated by exactly pi compare as `Greater` by convention.
#[must_use]
pub fn dir_cos_cmp(cos1: f64, sin1: f64, cos2: f64, sin2: f64) -> Ordering {
    if (cos1 == cos2) && (sin1 == sin2) {
        return Ordering::Equal;
    }

    if 1.0_f64.copysign(sin1) == 1.0_f64.copysign(sin2) {
        // both lines on the same side of the x-axis
        let upper = 1.0_f64.copysign(sin1) > 0.0;
        if (cos1 > cos2) == upper {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    } else if 1.0_f64.copysign(cos1) == 1.0_f64.copysign(cos2) {
        // both lines on the same side of the y-axis
        let right = 1.0_f64.copysign(cos1) > 0.0;
        if (sin1 < sin2) == right {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    } else if cos1 == -cos2 {
        // separated by exactly pi
        Ordering::Greater
    } else {
        // diagonal quadrants: fall back to explicit angles
        let theta = |c: f64, s: f64| {
            let t = c.acos();
            if s < 0.0 {
                std::f64::consts::TAU - t
            } else {
                t
            }
        };
        let theta1 = theta(cos1, sin1);
        let theta2 = theta(cos2, sin2);

        if theta1 < theta2 {
            if theta2 < theta1 + std::f64::consts::PI {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        } else if theta1 < theta2 + std::f64::consts::PI {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }
}

/// Normal-form equation of the line through `p1` and `p2`.
///
/// The points are assumed to be distinct. The sign of the coefficients is
/// chosen so that `dist <= 0` when the origin lies on the positive side of
/// the line.
#[must_use]
pub fn normal_line(p1: Point2, p2: Point2) -> NormalLine {
    // general form Ax + By + C = 0 through the two points
    let a = p2.y - p1.y;
    let b = p1.x - p2.x;
    let c = p2.x * p1.y - p1.x * p2.y;

    let mut len = a.hypot(b);
    len = if c == 0.0 {
        len.copysign(b)
    } else {
        -len.copysign(c)
    };

    NormalLine {
        cos: a / len,
        sin: b / len,
        dist: c / len,
    }
}

/// Intersection test for the line segments `a1..a2` and `b1..b2`.
///
/// Segment endpoints are assumed to be distinct within each segment.
/// `OnBound` means contact only at an endpoint (or collinear contact at a
/// single point); `Inside` means a proper crossing or collinear overlap.
#[must_use]
pub fn segments_intersect(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Placement {
    let line_a = normal_line(a1, a2);
    let line_b = normal_line(b1, b2);

    if are_equal(line_a.cos, line_b.cos) && are_equal(line_a.sin, line_b.sin) {
        if !are_equal(line_a.dist, line_b.dist) {
            // parallel but not collinear
            return Placement::Outside;
        }

        // collinear: reduce to 1-D overlap along the faster-changing axis
        let key = |p: Point2| if line_a.cos > line_a.sin { p.x } else { p.y };
        let (a_min, a_max) = minmax(key(a1), key(a2));
        let (b_min, b_max) = minmax(key(b1), key(b2));

        if (b_min > a_max) || (a_min > b_max) {
            Placement::Outside
        } else if are_equal(b_min, a_max) || are_equal(a_min, b_max) {
            Placement::OnBound
        } else {
            Placement::Inside
        }
    } else {
        // non-parallel: compare signs of endpoint distances from each line
        let snap = |v: f64| if are_equal(v, 0.0) { 0.0 } else { v };
        let a1_db = snap(line_b.signed_distance(a1));
        let a2_db = snap(line_b.signed_distance(a2));
        let b1_da = snap(line_a.signed_distance(b1));
        let b2_da = snap(line_a.signed_distance(b2));

        let sign_a = b1_da * b2_da;
        let sign_b = a1_db * a2_db;

        if sign_a > 0.0 || sign_b > 0.0 {
            // some segment lies entirely on one side of the other's line
            Placement::Outside
        } else if (sign_a < 0.0) && (sign_b < 0.0) {
            Placement::Inside
        } else {
            Placement::OnBound
        }
    }
}

fn minmax(a: f64, b: f64) -> (f64, f64) {
    if a > b { (b, a) } else { (a, b) }
}

/// Position of `p` relative to the strip bounded by two parallel lines.
///
/// The lines are assumed to be parallel. The distance-product sign is
/// reconciled by whether the two lines lie on the same side of the origin.
#[must_use]
pub fn point_vs_parallel_lines(p: Point2, line1: &NormalLine, line2: &NormalLine) -> Placement {
    let snap = |v: f64| if are_equal(v, 0.0) { 0.0 } else { v };
    let d1 = snap(line1.signed_distance(p));
    let d2 = snap(line2.signed_distance(p));

    let mut prod = d1 * d2;

    // reverse the sign when the lines straddle the origin
    let same_side = if line1.cos.abs() > line1.sin.abs() {
        1.0_f64.copysign(line1.cos) == 1.0_f64.copysign(line2.cos)
    } else {
        1.0_f64.copysign(line1.sin) == 1.0_f64.copysign(line2.sin)
    };
    if !same_side {
        prod = -prod;
    }

    if prod > 0.0 {
        Placement::Outside
    } else if prod < 0.0 {
        Placement::Inside
    } else {
        Placement::OnBound
    }
}

/// Position of a point relative to a rectangle.
#[must_use]
pub fn point_vs_rect(p: Point2, rect: &Rect2) -> Placement {
    let [c1, c2, c3, c4] = rect.corners;

    // first pair of opposite edges
    let line1 = normal_line(c1, c2);
    let line2 = normal_line(c3, c4);
    let first = point_vs_parallel_lines(p, &line1, &line2);
    if first == Placement::Outside {
        return Placement::Outside;
    }

    // second pair of opposite edges
    let line1 = normal_line(c1, c4);
    let line2 = normal_line(c2, c3);
    let second = point_vs_parallel_lines(p, &line1, &line2);
    if second == Placement::Outside {
        Placement::Outside
    } else if (first == Placement::Inside) && (second == Placement::Inside) {
        Placement::Inside
    } else {
        Placement::OnBound
    }
}

/// Intersection test for two rectangles.
///
/// First the diagonals are tested against each other; failing a proper
/// crossing, every corner is tested against the other rectangle. Touching
/// edges or corners report `OnBound`.
#[must_use]
pub fn rects_intersect(r1: &Rect2, r2: &Rect2) -> Placement {
    let d1 = (r1.corners[0], r1.corners[2]);
    let d2 = (r1.corners[1], r1.corners[3]);
    let e1 = (r2.corners[0], r2.corners[2]);
    let e2 = (r2.corners[1], r2.corners[3]);

    let mut result = segments_intersect(d1.0, d1.1, e1.0, e1.1);
    for (a, b) in [(d1, e2), (d2, e1), (d2, e2)] {
        if result == Placement::Inside {
            return result;
        }
        result = segments_intersect(a.0, a.1, b.0, b.1);
    }

    if result != Placement::Inside {
        let mut on_boundary = result == Placement::OnBound;
        let corner_tests = r1
            .corners
            .iter()
            .map(|&c| (c, r2))
            .chain(r2.corners.iter().map(|&c| (c, r1)));

        for (corner, rect) in corner_tests {
            result = point_vs_rect(corner, rect);
            if result == Placement::Inside {
                return result;
            }
            on_boundary |= result == Placement::OnBound;
        }

        result = if on_boundary {
            Placement::OnBound
        } else {
            Placement::Outside
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn unit_square(cx: f64, cy: f64) -> Rect2 {
        Rect2 {
            corners: [
                Point2::new(cx - 0.5, cy - 0.5),
                Point2::new(cx + 0.5, cy - 0.5),
                Point2::new(cx + 0.5, cy + 0.5),
                Point2::new(cx - 0.5, cy + 0.5),
            ],
        }
    }

    #[test]
    fn dir_cosines_basic() {
        let (c, s) = dir_cosines(Point2::new(1.0, 1.0), Point2::new(2.0, 2.0));
        assert_approx_eq!(f64, c, std::f64::consts::FRAC_1_SQRT_2, ulps = 2);
        assert_approx_eq!(f64, s, std::f64::consts::FRAC_1_SQRT_2, ulps = 2);

        // coincident points point along x
        let p = Point2::new(3.0, -4.0);
        assert_eq!(dir_cosines(p, p), (1.0, 0.0));
    }

    #[test]
    fn dir_cos_cmp_is_antisymmetric() {
        let angles: [f64; 4] = [0.1, 1.0, 2.0, 2.9];
        for &a in &angles {
            for &b in &angles {
                let fwd = dir_cos_cmp(a.cos(), a.sin(), b.cos(), b.sin());
                let rev = dir_cos_cmp(b.cos(), b.sin(), a.cos(), a.sin());
                if a == b {
                    assert_eq!(fwd, Ordering::Equal);
                } else {
                    assert_eq!(fwd, rev.reverse());
                }
            }
        }
    }

    #[test]
    fn dir_cos_cmp_is_transitive_within_half_plane() {
        let angles: [f64; 4] = [0.2, 0.9, 1.7, 2.6];
        for w in angles.windows(3) {
            let cmp01 = dir_cos_cmp(w[0].cos(), w[0].sin(), w[1].cos(), w[1].sin());
            let cmp12 = dir_cos_cmp(w[1].cos(), w[1].sin(), w[2].cos(), w[2].sin());
            let cmp02 = dir_cos_cmp(w[0].cos(), w[0].sin(), w[2].cos(), w[2].sin());
            assert_eq!(cmp01, Ordering::Less);
            assert_eq!(cmp12, Ordering::Less);
            assert_eq!(cmp02, Ordering::Less);
        }
    }

    #[test]
    fn dir_cos_cmp_pi_separation() {
        assert_eq!(dir_cos_cmp(1.0, 0.0, -1.0, 0.0), Ordering::Greater);
    }

    #[test]
    fn normal_line_passes_through_points() {
        let p1 = Point2::new(1.0, 2.0);
        let p2 = Point2::new(4.0, -1.0);
        let line = normal_line(p1, p2);
        assert_approx_eq!(f64, line.signed_distance(p1), 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, line.signed_distance(p2), 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, line.cos.hypot(line.sin), 1.0, ulps = 2);
    }

    #[test]
    fn segments_crossing() {
        let result = segments_intersect(
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0),
            Point2::new(1.0, -1.0),
        );
        assert_eq!(result, Placement::Inside);
    }

    #[test]
    fn segments_touching_at_endpoint() {
        let result = segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
        );
        assert_eq!(result, Placement::OnBound);
    }

    #[test]
    fn segments_parallel_disjoint() {
        let result = segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
        );
        assert_eq!(result, Placement::Outside);
    }

    #[test]
    fn segments_collinear_overlap() {
        let result = segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(3.0, 0.0),
        );
        assert_eq!(result, Placement::Inside);
    }

    #[test]
    fn point_vs_rect_cases() {
        let rect = unit_square(5.0, 0.0);
        assert_eq!(point_vs_rect(Point2::new(5.0, 0.0), &rect), Placement::Inside);
        assert_eq!(point_vs_rect(Point2::new(4.5, 0.0), &rect), Placement::OnBound);
        assert_eq!(point_vs_rect(Point2::new(4.5, 0.5), &rect), Placement::OnBound);
        assert_eq!(point_vs_rect(Point2::new(3.0, 0.0), &rect), Placement::Outside);
    }

    #[test]
    fn rect_intersects_itself() {
        let rect = unit_square(5.0, 0.0);
        assert_eq!(rects_intersect(&rect, &rect), Placement::Inside);
    }

    #[test]
    fn rects_intersect_is_symmetric() {
        let a = unit_square(5.0, 0.0);
        let b = unit_square(5.7, 0.3);
        let c = unit_square(8.0, 0.0);
        let d = unit_square(6.0, 0.0); // shares an edge with a
        assert_eq!(rects_intersect(&a, &b), rects_intersect(&b, &a));
        assert_eq!(rects_intersect(&a, &b), Placement::Inside);
        assert_eq!(rects_intersect(&a, &c), Placement::Outside);
        assert_eq!(rects_intersect(&a, &d), Placement::OnBound);
    }

    #[test]
    fn contained_rect_is_inside() {
        let outer = unit_square(0.0, 0.0);
        let inner = Rect2 {
            corners: [
                Point2::new(-0.2, -0.2),
                Point2::new(0.2, -0.2),
                Point2::new(0.2, 0.2),
                Point2::new(-0.2, 0.2),
            ],
        };
        assert_eq!(rects_intersect(&outer, &inner), Placement::Inside);
        assert_eq!(rects_intersect(&inner, &outer), Placement::Inside);
    }
}
