//! Sweep configuration loading: JSON file first, then command-line overrides.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use fidelity_core::{ExperimentDesign, SweepConfig};

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct SweepOverrides {
    /// Generations stepped per run.
    #[arg(long)]
    pub generations: Option<usize>,
    /// Founders per run.
    #[arg(long)]
    pub population_size: Option<usize>,
    /// Runs per environment.
    #[arg(long)]
    pub repeats: Option<usize>,
    /// Random environment specifications per experiment.
    #[arg(long)]
    pub environments: Option<usize>,
    /// Scale of the random environment specifications.
    #[arg(long)]
    pub max_sd: Option<f64>,
    /// Population ceiling as a multiple of the founder count.
    #[arg(long)]
    pub population_limit_multiplier: Option<usize>,
    /// Seed for reproducible sweeps.
    #[arg(long, env = "FIDELITY_SEED")]
    pub seed: Option<u64>,
    /// Replace the configured experiments with the 8-row fractional design.
    #[arg(long)]
    pub fractional: bool,
}

impl SweepOverrides {
    /// Overwrite every field that was given on the command line.
    pub fn apply(&self, config: &mut SweepConfig) {
        if let Some(generations) = self.generations {
            config.generations = generations;
        }
        if let Some(population_size) = self.population_size {
            config.population_size = population_size;
        }
        if let Some(repeats) = self.repeats {
            config.repeats = repeats;
        }
        if let Some(environments) = self.environments {
            config.environments = environments;
        }
        if let Some(max_sd) = self.max_sd {
            config.max_sd = max_sd;
        }
        if let Some(multiplier) = self.population_limit_multiplier {
            config.population_limit_multiplier = multiplier;
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        if self.fractional {
            config.design.experiments = ExperimentDesign::fractional().experiments;
        }
    }
}

/// Load a sweep configuration from JSON, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    let Some(path) = path else {
        return Ok(SweepConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

/// Load, override and validate in one step.
pub fn resolve_config(path: Option<&Path>, overrides: &SweepOverrides) -> Result<SweepConfig> {
    let mut config = load_config(path)?;
    overrides.apply(&mut config);
    config.validate().context("sweep configuration rejected")?;
    Ok(config)
}
