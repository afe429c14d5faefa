//! The in-flight photon record threaded through the detector core.

use crate::consts::MAX_DET_INTERACTIONS;
use crate::geom2d::Point2;
use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

/// A position in tomograph coordinates (cm).
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Position {
    /// Transaxial x (cm).
    pub x: f64,
    /// Transaxial y (cm).
    pub y: f64,
    /// Axial z (cm).
    pub z: f64,
}

impl Position {
    /// Creates a position from its coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The transaxial projection of this position.
    #[must_use]
    pub const fn transaxial(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// The position reached by traveling `distance` along `dir`.
    #[must_use]
    pub fn along(&self, dir: Direction, distance: f64) -> Self {
        Self {
            x: dir.cx.mul_add(distance, self.x),
            y: dir.cy.mul_add(distance, self.y),
            z: dir.cz.mul_add(distance, self.z),
        }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A direction as unit-vector cosines.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Direction {
    /// x direction cosine.
    pub cx: f64,
    /// y direction cosine.
    pub cy: f64,
    /// z direction cosine.
    pub cz: f64,
}

impl Direction {
    /// Creates a direction from its cosines. The caller is responsible for
    /// normalization.
    #[must_use]
    pub const fn new(cx: f64, cy: f64, cz: f64) -> Self {
        Self { cx, cy, cz }
    }

    /// The reversed direction.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self {
            cx: -self.cx,
            cy: -self.cy,
            cz: -self.cz,
        }
    }

    /// `sin` of the polar angle whose cosine is `cz`.
    #[must_use]
    pub fn sin_z(&self) -> f64 {
        self.cz.mul_add(-self.cz, 1.0).sqrt()
    }
}

/// Addresses one material element inside the detector hierarchy.
///
/// Shapes that have no sub-block structure leave the finer indices at zero.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ElementIndex {
    /// Axial ring.
    pub ring: usize,
    /// Block within the ring (layer for cylindrical shapes).
    pub block: usize,
    /// Radial layer within the block.
    pub layer: usize,
    /// Element within the layer.
    pub element: usize,
}

/// One recorded interaction of a photon inside the detector.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Interaction {
    /// Where the interaction happened, in tomograph coordinates.
    pub position: Position,
    /// Which detector element it happened in.
    pub indices: ElementIndex,
    /// Energy deposited here (keV); zero for inactive volumes.
    pub energy_deposited: f64,
    /// Whether the volume was an active one.
    pub is_active: bool,
}

/// The photon's bounded interaction list. Stored in place; no heap
/// allocation occurs while tracking.
pub type InteractionList = ArrayVec<Interaction, MAX_DET_INTERACTIONS>;

/// Which member of an annihilation pair a photon is.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PhotonColor {
    /// First member of the pair (or the only photon in SPECT).
    #[default]
    Blue,
    /// Second member of the pair.
    Pink,
}

/// The central mutable record the core threads through tracking.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Photon {
    /// Sequence number of the photon, used in diagnostics.
    pub number: u64,
    /// Current location in tomograph coordinates.
    pub location: Position,
    /// Current direction of travel.
    pub direction: Direction,
    /// Current energy (keV).
    pub energy: f64,
    /// Current statistical weight.
    pub weight: f64,
    /// Weight of the originating decay; never modified by the core.
    pub decay_weight: f64,
    /// Scatter-component sub-weight, carried through unchanged.
    pub scatter_weight: f64,
    /// Primary-component sub-weight, carried through unchanged.
    pub primary_weight: f64,
    /// Total distance traveled (cm); proxies time of flight.
    pub travel_distance: f64,
    /// Member of the annihilation pair.
    pub color: PhotonColor,
    /// Recorded detector interactions, in travel order.
    pub interactions: InteractionList,
    /// Detected position, set when tracking completes with a deposit.
    pub detected_location: Position,
    /// Detected crystal id (block detectors only).
    pub detected_crystal: i64,
    /// View angle of the detector head (planar and dual-head shapes).
    pub detector_angle: f64,
}

impl Photon {
    /// Creates a fresh photon ready to enter the detector.
    #[must_use]
    pub fn new(
        number: u64,
        location: Position,
        direction: Direction,
        energy: f64,
        weight: f64,
    ) -> Self {
        Self {
            number,
            location,
            direction,
            energy,
            weight,
            decay_weight: 1.0,
            scatter_weight: 0.0,
            primary_weight: weight,
            travel_distance: 0.0,
            color: PhotonColor::Blue,
            interactions: InteractionList::new(),
            detected_location: Position::default(),
            detected_crystal: -1,
            detector_angle: 0.0,
        }
    }

    /// Moves the photon `distance` along its direction, accumulating the
    /// travel distance.
    pub fn advance(&mut self, distance: f64) {
        self.location = self.location.along(self.direction, distance);
        self.travel_distance += distance;
    }

    /// Moves the photon to `position`, accumulating `distance` traveled.
    pub fn move_to(&mut self, position: Position, distance: f64) {
        self.location = position;
        self.travel_distance += distance;
    }

    /// Number of interactions recorded so far.
    #[must_use]
    pub fn num_interactions(&self) -> usize {
        self.interactions.len()
    }

    /// Clears the direction vector once the photon has been detected; it is
    /// no longer meaningful afterwards.
    pub fn clear_direction(&mut self) {
        self.direction = Direction::new(0.0, 0.0, 0.0);
    }
}
