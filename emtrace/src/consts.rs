//! Numerical constants shared across the detector core.
//!
//! The tolerance family collects the epsilons that the tracking code uses to
//! resolve near-misses (tangent chords, shared element faces, boundary
//! round-off). They are deliberately distinct values: each one is tuned to
//! the magnitude of the quantity it guards.

/// Maximum number of recorded interactions per photon. Reaching the cap
/// forces an absorption.
pub const MAX_DET_INTERACTIONS: usize = 16;

/// Photons below this energy (keV) are absorbed outright after a scatter.
pub const MIN_PHOTON_ENERGY: f64 = 1.0;

/// Fuzzy-equality tolerance for the 2-D geometry predicates.
pub const GEOM_EPSILON: f64 = 1e-10;

/// Tolerance for locating a position on a block-element face.
pub const ELEMENT_EDGE_EPSILON: f64 = 1e-12;

/// Distance a photon is nudged past an element boundary so that the next
/// element lookup is unambiguous.
pub const BOUNDARY_NUDGE: f64 = 1e-9;

/// Residual travel distance below which an intra-block walk terminates.
pub const RESIDUAL_DISTANCE: f64 = 1e-7;

/// Determinant magnitude below which two 2-D lines are treated as parallel.
pub const PARALLEL_DETERMINANT: f64 = 1e-15;

/// Direction cosine defect below which a photon counts as purely axial.
pub const AXIAL_COSINE_DEFECT: f64 = 1e-8;

/// Squared-radius slack when testing whether a photon already sits on the
/// inner bounding cylinder.
pub const INNER_SURFACE_SLACK: f64 = 1e-9;

/// A 2-D segment length longer than any detector, used to turn a ray into a
/// finite segment for the intersection predicates.
pub const LONG_SEGMENT: f64 = 8192.0;

/// As [`LONG_SEGMENT`], but for the intra-ring block-exit search where the
/// segment must dwarf even the outer-cylinder diameter by a wide margin.
pub const VERY_LONG_SEGMENT: f64 = 8_388_608.0;

/// A per-axis travel distance standing in for "never reaches that face".
pub const NO_FACE_DISTANCE: f64 = 1e8;

/// Converts a FWHM expressed in percent to a standard deviation:
/// `100 * 2 * sqrt(2 ln 2)`.
pub const GAUSS_FWHM_MAGIC: f64 = 235.4820045;

/// Speed of light in cm/s, for time-of-flight blurring of travel distances.
pub const SPEED_OF_LIGHT: f64 = 2.99792458e10;

/// Axial extent assigned to the unbounded helper cylinders (collimator bound,
/// outer block cylinder), which are limited radially but not axially.
pub const UNBOUNDED_Z: f64 = 10000.0;
