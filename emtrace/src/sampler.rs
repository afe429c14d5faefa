//! The random-number contract consumed by the detector core.
//!
//! Reproducibility hinges on the draw order: scatter decisions, truncated
//! exponential sampling, and the scatter kernels each consume the stream in
//! a fixed sequence, so everything funnels through this one trait.

/// Source of the uniform, exponential, and Gaussian draws used by tracking.
pub trait Sampler {
    /// A uniform draw on `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// A unit-mean exponential draw; free paths between interactions.
    fn free_paths(&mut self) -> f64 {
        -(1.0 - self.uniform()).ln()
    }

    /// A Gaussian draw with the given mean and standard deviation
    /// (Box-Muller, consuming two uniforms).
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        let radius = (-2.0 * u1.ln()).sqrt();
        let angle = std::f64::consts::TAU * u2;
        radius.mul_add(angle.cos() * std_dev, mean)
    }
}

/// Adapts any [`rand::Rng`] into a [`Sampler`].
#[derive(Clone, Debug)]
pub struct RngSampler<R>(pub R);

impl<R: rand::Rng> Sampler for RngSampler<R> {
    fn uniform(&mut self) -> f64 {
        self.0.gen_range(0.0..1.0)
    }
}

/// Replays a fixed sequence of uniform draws; cycles when exhausted.
///
/// Used to pin down the random stream in tests and replay investigations.
#[derive(Clone, Debug)]
pub struct SequenceSampler {
    draws: Vec<f64>,
    next: usize,
}

impl SequenceSampler {
    /// Creates a sampler replaying `draws` cyclically.
    ///
    /// # Panics
    ///
    /// Panics if `draws` is empty.
    #[must_use]
    pub fn new(draws: Vec<f64>) -> Self {
        assert!(!draws.is_empty());
        Self { draws, next: 0 }
    }
}

impl Sampler for SequenceSampler {
    fn uniform(&mut self) -> f64 {
        let value = self.draws[self.next % self.draws.len()];
        self.next += 1;
        value
    }
}
