//! AR(1)-with-bias noise used to drive environmental change.
//!
//! The process steps `value = theta * value + N(0, sd) + bias` from zero. A
//! random number of burn-in steps is discarded before the first yielded value
//! so the output does not depend on the zero start.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Earliest burn-in start index (inclusive).
pub const BURN_IN_START: i64 = -100;
/// Latest burn-in start index (inclusive).
pub const BURN_IN_END: i64 = -50;

/// Coefficients of an AR(1)-with-bias process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ArParams {
    /// Feedback on the previous value; may be negative.
    pub theta: f64,
    /// Standard deviation of the Gaussian noise term.
    pub sd: f64,
    /// Constant drift added every step.
    pub bias: f64,
}

impl ArParams {
    #[must_use]
    pub const fn new(theta: f64, sd: f64, bias: f64) -> Self {
        Self { theta, sd, bias }
    }

    /// Draw a random specification: `theta` in `(-max_sd, max_sd)`, `sd` in
    /// `[0, max_sd)` and `bias` in `(-max_sd / 10, max_sd / 10)`.
    pub fn random(max_sd: f64, rng: &mut dyn RngCore) -> Result<Self, ConfigError> {
        if !max_sd.is_finite() || max_sd <= 0.0 {
            return Err(ConfigError::InvalidConfig("max_sd must be positive"));
        }
        Ok(Self {
            theta: rng.random_range(-max_sd..max_sd),
            sd: rng.random_range(0.0..max_sd),
            bias: rng.random_range(-max_sd / 10.0..max_sd / 10.0),
        })
    }
}

/// Lazy finite AR series. Each call to [`generate_ar_series`] is a fresh run.
pub struct ArSeries<'a> {
    theta: f64,
    bias: f64,
    noise: Normal<f64>,
    value: f64,
    index: i64,
    length: i64,
    rng: &'a mut dyn RngCore,
}

impl std::fmt::Debug for ArSeries<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArSeries")
            .field("theta", &self.theta)
            .field("bias", &self.bias)
            .field("value", &self.value)
            .field("index", &self.index)
            .field("length", &self.length)
            .finish()
    }
}

impl Iterator for ArSeries<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        while self.index < self.length {
            let index = self.index;
            self.index += 1;
            self.value = self.theta * self.value + self.noise.sample(&mut *self.rng) + self.bias;
            if index >= 0 {
                return Some(self.value);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.length - self.index.max(0)).unwrap_or(0);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArSeries<'_> {}

/// Start an AR series of exactly `length` values.
///
/// The burn-in start is drawn uniformly from `BURN_IN_START..=BURN_IN_END`.
pub fn generate_ar_series(
    params: ArParams,
    length: usize,
    rng: &mut dyn RngCore,
) -> Result<ArSeries<'_>, ConfigError> {
    let noise = Normal::new(0.0, params.sd)
        .map_err(|_| ConfigError::InvalidConfig("AR sd must be finite and non-negative"))?;
    if !params.theta.is_finite() || !params.bias.is_finite() {
        return Err(ConfigError::InvalidConfig("AR theta and bias must be finite"));
    }
    let length = i64::try_from(length)
        .map_err(|_| ConfigError::InvalidConfig("AR series length is too large"))?;
    let start = rng.random_range(BURN_IN_START..=BURN_IN_END);
    Ok(ArSeries {
        theta: params.theta,
        bias: params.bias,
        noise,
        value: 0.0,
        index: start,
        length,
        rng,
    })
}
