//! Error type for the detector core.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter deck failed validation.
    #[error("configuration error: {0}")]
    Config(String),
    /// Detector geometry failed a load-time consistency check.
    #[error("geometry error: {0}")]
    Geometry(String),
    /// A tracking invariant was violated at run time. Carries the function
    /// that detected it and the photon number being tracked.
    #[error("tracking invariant violated in {function} (photon {photon}): {message}")]
    Tracking {
        /// Function that detected the violation.
        function: &'static str,
        /// Number of the photon being tracked.
        photon: u64,
        /// What went wrong.
        message: String,
    },
    /// Error that does not originate from this crate.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Catch-all result for this crate.
pub type Result<T> = std::result::Result<T, Error>;
