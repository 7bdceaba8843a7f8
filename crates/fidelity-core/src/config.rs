//! Sweep-level configuration.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::design::ExperimentDesign;

/// Errors raised by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Parameters of a full factorial sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    /// Generations stepped per run.
    pub generations: usize,
    /// Founders per run; also the population cap.
    pub population_size: usize,
    /// Runs per (experiment, environment) pair.
    pub repeats: usize,
    /// Random environment specifications drawn per experiment.
    pub environments: usize,
    /// Scale of the random environment specifications.
    pub max_sd: f64,
    /// Runs stop once the population exceeds this multiple of the founder count.
    pub population_limit_multiplier: usize,
    /// Optional RNG seed for reproducible sweeps.
    pub rng_seed: Option<u64>,
    /// Factor levels and experiment rows.
    pub design: ExperimentDesign,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            generations: 500,
            population_size: 5_000,
            repeats: 3,
            environments: 50,
            max_sd: 0.3,
            population_limit_multiplier: 10,
            rng_seed: None,
            design: ExperimentDesign::default(),
        }
    }
}

impl SweepConfig {
    /// Validate values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidConfig("population_size must be positive"));
        }
        if u32::try_from(self.population_size).is_err() {
            return Err(ConfigError::InvalidConfig(
                "population_size must fit a lineage identifier",
            ));
        }
        if self.repeats == 0 || self.environments == 0 {
            return Err(ConfigError::InvalidConfig(
                "repeats and environments must be positive",
            ));
        }
        if !self.max_sd.is_finite() || self.max_sd <= 0.0 {
            return Err(ConfigError::InvalidConfig("max_sd must be positive"));
        }
        if self.population_limit_multiplier == 0 {
            return Err(ConfigError::InvalidConfig(
                "population_limit_multiplier must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the configured seed, generating one from entropy if absent.
    #[must_use]
    pub fn resolve_seed(&self) -> u64 {
        self.rng_seed.unwrap_or_else(rand::random)
    }

    /// Total number of simulation runs the sweep performs.
    #[must_use]
    pub fn total_runs(&self) -> usize {
        self.design.experiments.len() * self.environments * self.repeats
    }
}

/// Independent generator for one run of a sweep seeded with `seed`.
///
/// Streams are offset by `run + 1`, leaving `SmallRng::seed_from_u64(seed)`
/// free for the sweep's own environment draws.
#[must_use]
pub fn run_rng(seed: u64, run: usize) -> SmallRng {
    let stream = (run as u64).wrapping_add(1);
    SmallRng::seed_from_u64(seed.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
}
