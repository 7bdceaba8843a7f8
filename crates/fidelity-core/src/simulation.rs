//! Simulation driver: steps the generation engine until the run terminates.

use std::collections::BTreeMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::engine::{apply_environment, downsample, reproduce, select};
use crate::entity::{Entity, EntityError, Lineage};
use crate::environment::{Environment, EnvironmentError};
use crate::factors::Factors;
use crate::summary::{GenerationSummary, summarize};

/// Runs stop as soon as fewer entities than this remain.
pub const MIN_VIABLE_POPULATION: usize = 3;

/// Errors that abort a run. Population collapse is not one of them.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every requested generation was stepped.
    Completed,
    /// The population fell below [`MIN_VIABLE_POPULATION`].
    Collapsed,
    /// The population exceeded the configured ceiling.
    Overflowed,
    /// The driver was consumed before the run terminated.
    Stopped,
}

/// Driver state after construction or a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stepping,
    Terminated(Termination),
}

/// Everything a finished run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Initial summary followed by one summary per completed step.
    pub summaries: Vec<GenerationSummary>,
    pub termination: Termination,
    /// Generation steps attempted, including a terminating one.
    pub steps: usize,
    /// Surviving entities per lineage at termination.
    pub lineages: BTreeMap<Lineage, usize>,
}

/// A single run over a fixed environment.
#[derive(Debug)]
pub struct Simulation<'env> {
    factors: Factors,
    environment: &'env Environment,
    population: Vec<Entity>,
    original_size: usize,
    ceiling: usize,
    generations: usize,
    step: usize,
    state: RunState,
    summaries: Vec<GenerationSummary>,
}

impl<'env> Simulation<'env> {
    /// Validate inputs and record the initial summary.
    pub fn new(
        factors: Factors,
        population: Vec<Entity>,
        generations: usize,
        population_limit_multiplier: usize,
        environment: &'env Environment,
    ) -> Result<Self, SimulationError> {
        factors.validate()?;
        environment.check_covers(&population, generations)?;
        let original_size = population.len();
        let mut summaries = Vec::with_capacity(generations + 1);
        summaries.push(summarize(&population, 0));
        Ok(Self {
            factors,
            environment,
            ceiling: population_limit_multiplier.saturating_mul(original_size),
            original_size,
            population,
            generations,
            step: 0,
            state: if generations == 0 {
                RunState::Terminated(Termination::Completed)
            } else {
                RunState::Stepping
            },
            summaries,
        })
    }

    /// Advance one generation.
    ///
    /// Survivors and offspring are both drawn from the pre-step population.
    /// A step that leaves the population outside `[MIN_VIABLE_POPULATION,
    /// ceiling]` terminates the run without recording a summary.
    pub fn step(&mut self, rng: &mut dyn RngCore) -> Result<RunState, SimulationError> {
        if let RunState::Terminated(_) = self.state {
            return Ok(self.state);
        }
        let t = self.step;
        self.step += 1;

        let mut next = select(&self.factors, &self.population, rng);
        next.extend(reproduce(&self.factors, &self.population, rng)?);
        let next = downsample(next, self.original_size, rng);
        self.population = next;

        let size = self.population.len();
        debug!(step = t, population = size, "generation stepped");
        if size < MIN_VIABLE_POPULATION {
            self.state = RunState::Terminated(Termination::Collapsed);
            return Ok(self.state);
        }
        if size > self.ceiling {
            self.state = RunState::Terminated(Termination::Overflowed);
            return Ok(self.state);
        }

        let deltas = self.environment.slice(t).ok_or(EnvironmentError::TooShort {
            required: t + 1,
            available: self.environment.generations(),
        })?;
        self.population = apply_environment(&deltas, &self.population)?;
        // Labeled from the step index, so the first step shares label 1 with
        // the initial summary.
        self.summaries.push(summarize(&self.population, t));

        if self.step >= self.generations {
            self.state = RunState::Terminated(Termination::Completed);
        }
        Ok(self.state)
    }

    /// Step until the run terminates.
    pub fn run_to_end(&mut self, rng: &mut dyn RngCore) -> Result<Termination, SimulationError> {
        loop {
            if let RunState::Terminated(termination) = self.step(rng)? {
                return Ok(termination);
            }
        }
    }

    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn population(&self) -> &[Entity] {
        &self.population
    }

    #[must_use]
    pub fn summaries(&self) -> &[GenerationSummary] {
        &self.summaries
    }

    /// Entities per lineage in the current population.
    #[must_use]
    pub fn lineage_counts(&self) -> BTreeMap<Lineage, usize> {
        let mut counts = BTreeMap::new();
        for entity in &self.population {
            *counts.entry(entity.lineage()).or_insert(0) += 1;
        }
        counts
    }

    /// Consume the simulation, logging the termination diagnostic.
    ///
    /// A simulation still stepping is reported as [`Termination::Stopped`].
    #[must_use]
    pub fn into_report(self) -> RunReport {
        let termination = match self.state {
            RunState::Terminated(termination) => termination,
            RunState::Stepping => Termination::Stopped,
        };
        let lineages = self.lineage_counts();
        info!(
            generation = self.step,
            ?termination,
            population = self.population.len(),
            lineages = lineages.len(),
            "run finished",
        );
        debug!(?lineages, "surviving lineages");
        RunReport {
            summaries: self.summaries,
            termination,
            steps: self.step,
            lineages,
        }
    }
}

/// Run to termination and return the full report.
pub fn run_report(
    factors: Factors,
    population: Vec<Entity>,
    generations: usize,
    population_limit_multiplier: usize,
    environment: &Environment,
    rng: &mut dyn RngCore,
) -> Result<RunReport, SimulationError> {
    let mut simulation = Simulation::new(
        factors,
        population,
        generations,
        population_limit_multiplier,
        environment,
    )?;
    simulation.run_to_end(rng)?;
    Ok(simulation.into_report())
}

/// Run to termination and return the per-generation summaries.
pub fn run(
    factors: Factors,
    population: Vec<Entity>,
    generations: usize,
    population_limit_multiplier: usize,
    environment: &Environment,
    rng: &mut dyn RngCore,
) -> Result<Vec<GenerationSummary>, SimulationError> {
    run_report(
        factors,
        population,
        generations,
        population_limit_multiplier,
        environment,
        rng,
    )
    .map(|report| report.summaries)
}
