//! Core engine for the fitness/fidelity population simulation.
//!
//! A population of [`Entity`] values is stepped through discrete generations.
//! Each step selects survivors, breeds offspring from the same parent snapshot,
//! caps the population at its founding size and then perturbs fitness with an
//! [`Environment`] built from autoregressive noise series.
//!
//! All stochastic calls take an explicit `&mut dyn RngCore`; seed a
//! [`rand::rngs::SmallRng`] per run for reproducible, independent runs.

pub mod autoregressive;
pub mod config;
pub mod design;
pub mod engine;
pub mod entity;
pub mod environment;
pub mod factors;
pub mod simulation;
pub mod summary;

pub use autoregressive::{ArParams, ArSeries, BURN_IN_END, BURN_IN_START, generate_ar_series};
pub use config::{ConfigError, SweepConfig, run_rng};
pub use design::{DesignError, ExperimentDesign, FACTOR_NAMES, FactorTable, ResolvedExperiment};
pub use engine::{apply_environment, downsample, reproduce, select};
pub use entity::{Entity, EntityError, FOUNDER_TRAIT_MAX, Lineage, derive_trait, init_population};
pub use environment::{Environment, EnvironmentError, factorial_catalog, random_catalog};
pub use factors::{Factors, ProbabilityPolicy};
pub use simulation::{
    MIN_VIABLE_POPULATION, RunReport, RunState, Simulation, SimulationError, Termination, run,
    run_report,
};
pub use summary::{GenerationSummary, summarize};
