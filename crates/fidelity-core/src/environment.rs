//! Environment matrices: per-generation fitness deltas for the population.
//!
//! A matrix is either one series shared by every entity or one series per
//! founder lineage. The outer index is the lineage, the inner index the
//! generation.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::autoregressive::{ArParams, generate_ar_series};
use crate::config::ConfigError;
use crate::entity::{Entity, Lineage};

/// Errors raised when an environment cannot drive a run.
#[derive(Debug, Error, PartialEq)]
pub enum EnvironmentError {
    #[error("environment has no series")]
    Empty,
    #[error("environment series have unequal lengths ({shortest} vs {longest})")]
    Ragged { shortest: usize, longest: usize },
    #[error("environment covers {available} generations, run needs {required}")]
    TooShort { required: usize, available: usize },
    #[error("no environment series for lineage {lineage:?} ({available} series)")]
    MissingLineage { lineage: Lineage, available: usize },
}

/// Fitness deltas indexed by lineage (or a single shared row) and generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    series: Vec<Vec<f64>>,
}

impl Environment {
    /// One series applied to every entity.
    #[must_use]
    pub fn shared(series: Vec<f64>) -> Self {
        Self {
            series: vec![series],
        }
    }

    /// All-zero shared environment of the given length.
    #[must_use]
    pub fn zeros(generations: usize) -> Self {
        Self::shared(vec![0.0; generations])
    }

    /// Build from explicit rows, one per lineage (or a single shared row).
    pub fn from_rows(series: Vec<Vec<f64>>) -> Result<Self, EnvironmentError> {
        let shortest = series
            .iter()
            .map(Vec::len)
            .min()
            .ok_or(EnvironmentError::Empty)?;
        let longest = series.iter().map(Vec::len).max().unwrap_or(shortest);
        if shortest != longest {
            return Err(EnvironmentError::Ragged { shortest, longest });
        }
        Ok(Self { series })
    }

    /// Generate AR series for `generations` steps: one shared series, or one
    /// independent series per lineage when `by_lineage` is set.
    pub fn generate(
        params: ArParams,
        by_lineage: bool,
        lineages: usize,
        generations: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self, ConfigError> {
        let rows = if by_lineage { lineages } else { 1 };
        let mut series = Vec::with_capacity(rows);
        for _ in 0..rows {
            series.push(generate_ar_series(params, generations, rng)?.collect());
        }
        Ok(Self { series })
    }

    /// True when one series applies to the whole population.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.series.len() == 1
    }

    /// Number of generations every series covers.
    #[must_use]
    pub fn generations(&self) -> usize {
        self.series.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn series(&self) -> &[Vec<f64>] {
        &self.series
    }

    /// Deltas for generation `t` across all series.
    #[must_use]
    pub fn slice(&self, t: usize) -> Option<Vec<f64>> {
        self.series.iter().map(|row| row.get(t).copied()).collect()
    }

    /// Confirm this environment can drive `generations` steps of `population`.
    pub fn check_covers(
        &self,
        population: &[Entity],
        generations: usize,
    ) -> Result<(), EnvironmentError> {
        if generations == 0 {
            return Ok(());
        }
        if self.series.is_empty() {
            return Err(EnvironmentError::Empty);
        }
        let available = self.generations();
        if available < generations {
            return Err(EnvironmentError::TooShort {
                required: generations,
                available,
            });
        }
        if !self.is_shared() {
            if let Some(lineage) = population
                .iter()
                .map(Entity::lineage)
                .find(|lineage| lineage.index() >= self.series.len())
            {
                return Err(EnvironmentError::MissingLineage {
                    lineage,
                    available: self.series.len(),
                });
            }
        }
        Ok(())
    }
}

/// Catalog of random AR specifications with one realized series each.
///
/// `theta` is drawn from `(-max_sd, max_sd)`, `sd` from `[0, max_sd / 2)` and
/// `bias` from `(-max_sd / 4, max_sd / 4)`.
pub fn random_catalog(
    count: usize,
    max_sd: f64,
    length: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<(ArParams, Vec<f64>)>, ConfigError> {
    if !max_sd.is_finite() || max_sd <= 0.0 {
        return Err(ConfigError::InvalidConfig("max_sd must be positive"));
    }
    let mut catalog = Vec::with_capacity(count);
    for _ in 0..count {
        let params = ArParams::new(
            rng.random_range(-max_sd..max_sd),
            rng.random_range(0.0..max_sd / 2.0),
            rng.random_range(-max_sd / 4.0..max_sd / 4.0),
        );
        let series = generate_ar_series(params, length, rng)?.collect();
        catalog.push((params, series));
    }
    Ok(catalog)
}

/// Full factorial catalog over `theta in {-max_sd, 0, max_sd}`,
/// `sd in {0, max_sd / 2}` and `bias in {-max_sd / 4, 0, max_sd / 4}`.
pub fn factorial_catalog(
    max_sd: f64,
    length: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<(ArParams, Vec<f64>)>, ConfigError> {
    let thetas = [-max_sd, 0.0, max_sd];
    let sds = [0.0, max_sd / 2.0];
    let biases = [-max_sd / 4.0, 0.0, max_sd / 4.0];
    let mut catalog = Vec::with_capacity(thetas.len() * sds.len() * biases.len());
    for theta in thetas {
        for sd in sds {
            for bias in biases {
                let params = ArParams::new(theta, sd, bias);
                let series = generate_ar_series(params, length, rng)?.collect();
                catalog.push((params, series));
            }
        }
    }
    Ok(catalog)
}
