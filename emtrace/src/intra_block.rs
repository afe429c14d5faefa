//! Walks through the element grid of a single block: free-path
//! accumulation, free-path consumption, element lookup, and the
//! snap-to-active-element centroid search.
//!
//! All walking happens in block-local coordinates; positions are clamped
//! onto the bounding box first so transform round-off cannot strand a photon
//! just outside the block it is known to be in.

use crate::block_db::{BlockDb, BlockInfo};
use crate::consts::{
    BOUNDARY_NUDGE, ELEMENT_EDGE_EPSILON, NO_FACE_DISTANCE, RESIDUAL_DISTANCE,
};
use crate::photon::{Direction, Position};
use crate::xsection::CrossSection;

/// Outcome of [`intra_distance`].
#[derive(Clone, Copy, Debug)]
pub struct IntraResult {
    /// Distance implied by the free paths (extended past the block when the
    /// photon leaves without consuming them all).
    pub travel_distance: f64,
    /// Free paths actually consumed inside the block.
    pub free_paths_used: f64,
    /// Material of the last element traveled through.
    pub material: usize,
    /// Active status of that material.
    pub is_active: bool,
}

/// Locates the (layer, element) containing a block-local position.
///
/// The x-layer is found over half-open `[inner_x, outer_x)` intervals with
/// the outermost face included explicitly; the y and z partitions are the
/// first change value exceeding the coordinate. `None` when the position is
/// outside the grid.
#[must_use]
pub fn element_index(info: &BlockInfo, pos: &Position) -> Option<(usize, usize)> {
    let layer_num = if info.layers.len() == 1 {
        0
    } else {
        let first = &info.layers[0];
        let last = info.layers.last().unwrap();
        if (pos.x - first.inner_x).abs() < ELEMENT_EDGE_EPSILON {
            0
        } else if (pos.x - last.outer_x).abs() < ELEMENT_EDGE_EPSILON {
            info.layers.len() - 1
        } else {
            info.layers
                .iter()
                .position(|layer| (layer.inner_x <= pos.x) && (pos.x < layer.outer_x))?
        }
    };

    let layer = &info.layers[layer_num];
    let element_num = if layer.elements.len() == 1 {
        0
    } else {
        if !((info.y_min - ELEMENT_EDGE_EPSILON) <= pos.y
            && pos.y <= (info.y_max + ELEMENT_EDGE_EPSILON))
        {
            return None;
        }
        if !((info.z_min - ELEMENT_EDGE_EPSILON) <= pos.z
            && pos.z <= (info.z_max + ELEMENT_EDGE_EPSILON))
        {
            return None;
        }

        let y_element = layer
            .y_changes
            .iter()
            .position(|&change| pos.y < change)
            .unwrap_or(layer.y_changes.len());
        let z_element = layer
            .z_changes
            .iter()
            .position(|&change| pos.z < change)
            .unwrap_or(layer.z_changes.len());

        let element = z_element * layer.y_count() + y_element;
        if element >= layer.elements.len() {
            return None;
        }
        element
    };

    Some((layer_num, element_num))
}

/// The two diagonal corners of an element, in block-local coordinates.
#[must_use]
pub fn element_corners(info: &BlockInfo, layer_num: usize, element: usize) -> (Position, Position) {
    let layer = &info.layers[layer_num];
    let y_index = element % layer.y_count();
    let z_index = element / layer.y_count();

    let y_low = if y_index == 0 {
        info.y_min
    } else {
        layer.y_changes[y_index - 1]
    };
    let y_high = if y_index == layer.y_changes.len() {
        info.y_max
    } else {
        layer.y_changes[y_index]
    };
    let z_low = if z_index == 0 {
        info.z_min
    } else {
        layer.z_changes[z_index - 1]
    };
    let z_high = if z_index == layer.z_changes.len() {
        info.z_max
    } else {
        layer.z_changes[z_index]
    };

    (
        Position::new(layer.inner_x, y_low, z_low),
        Position::new(layer.outer_x, y_high, z_high),
    )
}

/// The center of an element, in block-local coordinates.
#[must_use]
pub fn element_center(info: &BlockInfo, layer_num: usize, element: usize) -> Position {
    let (c1, c2) = element_corners(info, layer_num, element);
    Position::new(
        0.5 * (c1.x + c2.x),
        0.5 * (c1.y + c2.y),
        0.5 * (c1.z + c2.z),
    )
}

/// Signs of motion along each axis; near-zero components reach no face.
struct AxisSigns {
    x_pos: bool,
    x_neg: bool,
    y_pos: bool,
    y_neg: bool,
    z_pos: bool,
    z_neg: bool,
}

impl AxisSigns {
    fn of(dir: Direction) -> Self {
        Self {
            x_pos: dir.cx > 1e-12,
            x_neg: dir.cx < -1e-12,
            y_pos: dir.cy > 1e-12,
            y_neg: dir.cy < -1e-12,
            z_pos: dir.cz > 1e-12,
            z_neg: dir.cz < -1e-12,
        }
    }
}

/// Distance from `pos` to the nearest face of the element with corners
/// `(c1, c2)` along `dir`.
fn element_exit_distance(pos: &Position, dir: Direction, signs: &AxisSigns, c1: &Position, c2: &Position) -> f64 {
    let x_dist = if signs.x_pos {
        (c2.x - pos.x) / dir.cx
    } else if signs.x_neg {
        (c1.x - pos.x) / dir.cx
    } else {
        NO_FACE_DISTANCE
    };
    let y_dist = if signs.y_pos {
        (c2.y - pos.y) / dir.cy
    } else if signs.y_neg {
        (c1.y - pos.y) / dir.cy
    } else {
        NO_FACE_DISTANCE
    };
    let z_dist = if signs.z_pos {
        (c2.z - pos.z) / dir.cz
    } else if signs.z_neg {
        (c1.z - pos.z) / dir.cz
    } else {
        NO_FACE_DISTANCE
    };

    x_dist.min(y_dist).min(z_dist)
}

/// Optical path accumulated over `travel_distance` along the photon's ray,
/// constrained to the block's bounding box.
#[must_use]
pub fn intra_free_paths(
    xsections: &dyn CrossSection,
    info: &BlockInfo,
    location: &Position,
    direction: Direction,
    energy: f64,
    travel_distance: f64,
) -> f64 {
    if travel_distance <= 0.0 {
        return 0.0;
    }

    if info.is_single_element() {
        let mu = xsections.attenuation(info.layers[0].elements[0].material, energy);
        return mu * travel_distance;
    }

    let mut pos = info.clamp_to_bounds(&info.tomo_to_block(location));
    let dir = info.tomo_to_block_dir(direction);
    let signs = AxisSigns::of(dir);

    let mut remaining = travel_distance;
    let mut free_paths = 0.0;
    loop {
        if let Some((layer_num, element_num)) = element_index(info, &pos) {
            let element = info.layers[layer_num].elements[element_num];
            let (c1, c2) = element_corners(info, layer_num, element_num);
            // step slightly beyond the face so the next lookup is unambiguous
            let step = element_exit_distance(&pos, dir, &signs, &c1, &c2) + BOUNDARY_NUDGE;

            pos = pos.along(dir, step);
            remaining -= step;
            free_paths += step * xsections.attenuation(element.material, energy);
        } else {
            // left the block
            remaining = 0.0;
        }

        if remaining.abs() <= RESIDUAL_DISTANCE {
            return free_paths;
        }
    }
}

/// Consumes `free_paths` walking the element grid, stopping at the
/// interaction point, the bounding-box exit, or `max_travel_dist`.
///
/// When the photon leaves the block before exhausting the free paths, the
/// returned travel distance is extended as if the last material continued,
/// and `free_paths_used` reports the consumed fraction.
#[must_use]
pub fn intra_distance(
    xsections: &dyn CrossSection,
    info: &BlockInfo,
    location: &Position,
    direction: Direction,
    energy: f64,
    free_paths: f64,
    max_travel_dist: f64,
) -> IntraResult {
    if info.is_single_element() {
        let element = info.layers[0].elements[0];
        let mu = xsections.attenuation(element.material, energy);
        let distance = free_paths / mu;
        let free_paths_used = if distance <= max_travel_dist {
            free_paths
        } else {
            max_travel_dist * mu
        };
        return IntraResult {
            travel_distance: distance,
            free_paths_used,
            material: element.material,
            is_active: element.is_active,
        };
    }

    let mut pos = info.clamp_to_bounds(&info.tomo_to_block(location));
    let dir = info.tomo_to_block_dir(direction);
    let signs = AxisSigns::of(dir);

    let mut cur_free_paths = free_paths;
    let mut distance = 0.0;
    let mut last: Option<(usize, bool, f64)> = None;

    loop {
        let element_here = if distance > max_travel_dist {
            None
        } else {
            element_index(info, &pos)
        };

        if let Some((layer_num, element_num)) = element_here {
            let element = info.layers[layer_num].elements[element_num];
            let (c1, c2) = element_corners(info, layer_num, element_num);
            let exit_dist = element_exit_distance(&pos, dir, &signs, &c1, &c2);

            let mu = xsections.attenuation(element.material, energy);
            last = Some((element.material, element.is_active, mu));

            // distance implied by the remaining free paths in this material
            let cur_distance = cur_free_paths / mu;

            if cur_distance > exit_dist {
                // crosses into the next element
                let step = exit_dist + BOUNDARY_NUDGE;
                pos = pos.along(dir, step);
                cur_free_paths -= step * mu;
                if cur_free_paths < 0.0 {
                    // the nudge overdrew the budget; restore the average error
                    cur_free_paths = BOUNDARY_NUDGE / 2.0 * mu;
                }
                distance += step;
            } else {
                // stops within this element
                return IntraResult {
                    travel_distance: distance + cur_distance,
                    free_paths_used: free_paths,
                    material: element.material,
                    is_active: element.is_active,
                };
            }
        } else {
            // left the block before consuming all free paths
            let (material, is_active, mu) = last.unwrap_or_else(|| {
                let element = info.layers[0].elements[0];
                (
                    element.material,
                    element.is_active,
                    xsections.attenuation(element.material, energy),
                )
            });
            if cur_free_paths > 0.0 {
                distance += cur_free_paths / mu;
            }
            return IntraResult {
                travel_distance: distance,
                free_paths_used: free_paths - cur_free_paths,
                material,
                is_active,
            };
        }
    }
}

/// Searches one layer for the active element whose center is closest to
/// `fixed` (block-local). Returns the element index and distance.
#[must_use]
pub fn search_centroid_layer(
    info: &BlockInfo,
    layer_num: usize,
    fixed: &Position,
) -> Option<(usize, f64)> {
    let layer = &info.layers[layer_num];
    let mut best: Option<(usize, f64)> = None;

    for (element_num, element) in layer.elements.iter().enumerate() {
        if !element.is_active {
            continue;
        }
        let center = element_center(info, layer_num, element_num);
        let dist_sqrd = (center.x - fixed.x).powi(2)
            + (center.y - fixed.y).powi(2)
            + (center.z - fixed.z).powi(2);
        if best.is_none_or(|(_, b)| dist_sqrd < b) {
            best = Some((element_num, dist_sqrd));
        }
    }

    best.map(|(element_num, dist_sqrd)| (element_num, dist_sqrd.sqrt()))
}

/// Finds the active element closest to a centroid in block `(ring, block)`
/// and returns its center (tomograph coordinates) and tomograph crystal id.
///
/// The centroid's own layer is searched first; when that layer holds no
/// active element, the nearest active layers above and below in x compete.
#[must_use]
pub fn find_centroid(
    db: &BlockDb,
    ring: usize,
    block: usize,
    orig_centroid: &Position,
) -> Option<(Position, i64)> {
    let info = db.info(ring, block);
    let record = db.record(ring, block);

    if info.is_single_element() {
        let element = info.layers[0].elements[0];
        if !element.is_active {
            return None;
        }
        // center of the block footprint; all four corners for robustness
        let center_2d = record
            .rect
            .corners
            .iter()
            .fold((0.0, 0.0), |acc, c| (acc.0 + c.x, acc.1 + c.y));
        let center = Position::new(
            center_2d.0 / 4.0,
            center_2d.1 / 4.0,
            0.5 * (record.z_min + record.z_max),
        );
        return Some((center, element.crystal_in_tomo));
    }

    let block_centroid = info.clamp_to_bounds(&info.tomo_to_block(orig_centroid));
    let (layer_num, element_num) = element_index(info, &block_centroid)?;

    let chosen = if info.layers[layer_num].elements[element_num].is_active {
        // already in an active element
        Some((layer_num, element_num))
    } else if info.layers[layer_num].has_active {
        search_centroid_layer(info, layer_num, &block_centroid)
            .map(|(element, _)| (layer_num, element))
    } else {
        // nearest active layers above and below in x compete
        let above = (layer_num + 1..info.layers.len())
            .find(|&l| info.layers[l].has_active)
            .and_then(|l| {
                search_centroid_layer(info, l, &block_centroid)
                    .map(|(element, dist)| (l, element, dist))
            });
        let below = (0..layer_num)
            .rev()
            .find(|&l| info.layers[l].has_active)
            .and_then(|l| {
                search_centroid_layer(info, l, &block_centroid)
                    .map(|(element, dist)| (l, element, dist))
            });

        match (above, below) {
            (Some((l1, e1, d1)), Some((_, _, d2))) if d1 <= d2 => Some((l1, e1)),
            (_, Some((l2, e2, _))) => Some((l2, e2)),
            (Some((l1, e1, _)), None) => Some((l1, e1)),
            (None, None) => None,
        }
    };

    chosen.map(|(layer_num, element_num)| {
        let center = element_center(info, layer_num, element_num);
        (
            info.block_to_tomo(&center),
            info.layers[layer_num].elements[element_num].crystal_in_tomo,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::xsection::{MaterialData, XsecTables};
    use float_cmp::assert_approx_eq;

    fn gridded_db() -> BlockDb {
        BlockDb::build(&fixtures::gridded_block(), 30.0).unwrap()
    }

    fn xsections() -> XsecTables {
        XsecTables::new(&[
            MaterialData::uniform("hot", 1.0, 0.5, 0.9),
            MaterialData::uniform("cold", 0.25, 0.5, 0.9),
        ])
        .unwrap()
    }

    #[test]
    fn element_lookup_matches_grid() {
        let db = gridded_db();
        let info = db.info(0, 0);
        // layer 0 is x in [0, 1), split at y = 0 and z = 0
        assert_eq!(
            element_index(info, &Position::new(0.5, -0.5, -0.5)),
            Some((0, 0))
        );
        assert_eq!(
            element_index(info, &Position::new(0.5, 0.5, -0.5)),
            Some((0, 1))
        );
        assert_eq!(
            element_index(info, &Position::new(0.5, -0.5, 0.5)),
            Some((0, 2))
        );
        assert_eq!(
            element_index(info, &Position::new(1.5, 0.5, 0.5)),
            Some((1, 3))
        );
        // the outermost x face belongs to the last layer
        assert_eq!(
            element_index(info, &Position::new(2.0, 0.5, 0.5)),
            Some((1, 3))
        );
        assert_eq!(element_index(info, &Position::new(0.5, 3.0, 0.0)), None);
    }

    #[test]
    fn corners_and_center_bound_the_element() {
        let db = gridded_db();
        let info = db.info(0, 0);
        let (c1, c2) = element_corners(info, 0, 1);
        assert_approx_eq!(f64, c1.x, 0.0, ulps = 2);
        assert_approx_eq!(f64, c2.x, 1.0, ulps = 2);
        assert_approx_eq!(f64, c1.y, 0.0, ulps = 2);
        assert_approx_eq!(f64, c2.y, 1.0, ulps = 2);
        assert_approx_eq!(f64, c1.z, -1.0, ulps = 2);
        assert_approx_eq!(f64, c2.z, 0.0, ulps = 2);

        let center = element_center(info, 0, 1);
        assert_approx_eq!(f64, center.x, 0.5, ulps = 2);
        assert_approx_eq!(f64, center.y, 0.5, ulps = 2);
        assert_approx_eq!(f64, center.z, -0.5, ulps = 2);
    }

    #[test]
    fn free_paths_accumulate_across_layers() {
        let db = gridded_db();
        let info = db.info(0, 0);
        let xs = xsections();

        // straight through both layers at the block center height
        let entry = info.block_to_tomo(&Position::new(0.0, -0.5, -0.5));
        let dir = Direction::new(1.0, 0.0, 0.0);
        let fp = intra_free_paths(&xs, info, &entry, dir, 511.0, 2.0);
        // layer 0 material 0 (mu 1.0), layer 1 material 1 (mu 0.25)
        assert_approx_eq!(f64, fp, 1.0 + 0.25, epsilon = 1e-6);
    }

    #[test]
    fn distance_stops_at_interaction() {
        let db = gridded_db();
        let info = db.info(0, 0);
        let xs = xsections();

        let entry = info.block_to_tomo(&Position::new(0.0, -0.5, -0.5));
        let dir = Direction::new(1.0, 0.0, 0.0);
        let result = intra_distance(&xs, info, &entry, dir, 511.0, 0.5, 2.0);
        assert_approx_eq!(f64, result.travel_distance, 0.5, epsilon = 1e-6);
        assert_approx_eq!(f64, result.free_paths_used, 0.5, ulps = 2);
        assert_eq!(result.material, 0);
    }

    #[test]
    fn distance_extends_past_exit() {
        let db = gridded_db();
        let info = db.info(0, 0);
        let xs = xsections();

        let entry = info.block_to_tomo(&Position::new(0.0, -0.5, -0.5));
        let dir = Direction::new(1.0, 0.0, 0.0);
        // 2.0 free paths: 1.0 consumed in layer 0, 0.25 in layer 1,
        // 0.75 left over -> extended at mu = 0.25 by 3 cm
        let result = intra_distance(&xs, info, &entry, dir, 511.0, 2.0, 2.0);
        assert!(result.travel_distance > 2.0);
        assert_approx_eq!(f64, result.travel_distance, 5.0, epsilon = 1e-4);
        assert_approx_eq!(f64, result.free_paths_used, 1.25, epsilon = 1e-6);
        assert_eq!(result.material, 1);
    }

    #[test]
    fn centroid_snaps_to_diagonal_active_element() {
        // active elements only on the grid diagonal
        let db = BlockDb::build(&fixtures::diagonal_block(), 30.0).unwrap();
        let info = db.info(0, 0);

        // a centroid inside the inactive (0, 1) element snaps to an active
        // element center
        let centroid = info.block_to_tomo(&Position::new(0.5, 0.5, -0.5));
        let (snapped, crystal) = find_centroid(&db, 0, 0, &centroid).unwrap();
        assert!(crystal >= 0);
        let local = info.tomo_to_block(&snapped);
        let (layer_num, element_num) = element_index(info, &local).unwrap();
        assert!(info.layers[layer_num].elements[element_num].is_active);
        let center = element_center(info, layer_num, element_num);
        assert_approx_eq!(f64, local.x, center.x, epsilon = 1e-9);
        assert_approx_eq!(f64, local.y, center.y, epsilon = 1e-9);
    }

    #[test]
    fn single_element_centroid_is_block_center() {
        let db = BlockDb::build(&fixtures::ring_of_blocks(4), 30.0).unwrap();
        let record = db.record(0, 0);
        let centroid = Position::new(41.0, 0.2, 0.3);
        let (snapped, crystal) = find_centroid(&db, 0, 0, &centroid).unwrap();
        assert_eq!(crystal, 0);
        assert_approx_eq!(f64, snapped.x, 41.0, epsilon = 1e-9);
        assert_approx_eq!(f64, snapped.y, 0.0, epsilon = 1e-9);
        assert_approx_eq!(f64, snapped.z, 0.5 * (record.z_min + record.z_max), ulps = 2);
    }
}
