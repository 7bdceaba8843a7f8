//! Resolved engine parameters for a single run.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// How a Bernoulli trial's success probability is chosen per entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityPolicy {
    /// Use the entity's own fitness as the probability.
    FitnessProportional,
    /// Use the same constant probability for every entity.
    Fixed(f64),
}

impl ProbabilityPolicy {
    /// Interpret a design-table value, where `0` stands for fitness-proportional.
    #[must_use]
    pub fn from_level_value(value: f64) -> Self {
        if value == 0.0 {
            Self::FitnessProportional
        } else {
            Self::Fixed(value)
        }
    }

    /// Probability applied to an entity with the given fitness.
    #[must_use]
    pub fn resolve(self, fitness: f64) -> f64 {
        match self {
            Self::FitnessProportional => fitness,
            Self::Fixed(probability) => probability,
        }
    }

    fn validate(self, context: &'static str) -> Result<(), ConfigError> {
        match self {
            Self::FitnessProportional => Ok(()),
            Self::Fixed(p) if (0.0..=1.0).contains(&p) => Ok(()),
            Self::Fixed(_) => Err(ConfigError::InvalidConfig(context)),
        }
    }
}

impl Default for ProbabilityPolicy {
    fn default() -> Self {
        Self::FitnessProportional
    }
}

/// Probabilistic rules controlling selection and reproduction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Factors {
    /// Chance that a parent reproduces at all in a generation.
    pub reproduction: ProbabilityPolicy,
    /// Chance that an entity survives selection.
    pub selection: ProbabilityPolicy,
    /// Inclusive upper bound of the per-parent offspring draw.
    pub max_offspring: u32,
    /// Offspring fidelity correlates with the parent's fidelity instead of a fresh draw.
    pub correlated: bool,
    /// Environment effects differ per lineage rather than one shared series.
    pub by_lineage: bool,
}

impl Default for Factors {
    fn default() -> Self {
        Self {
            reproduction: ProbabilityPolicy::FitnessProportional,
            selection: ProbabilityPolicy::FitnessProportional,
            max_offspring: 2,
            correlated: false,
            by_lineage: false,
        }
    }
}

impl Factors {
    /// Check fixed probabilities fall in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reproduction
            .validate("reproduction probability must lie in [0, 1]")?;
        self.selection
            .validate("selection probability must lie in [0, 1]")?;
        Ok(())
    }
}
