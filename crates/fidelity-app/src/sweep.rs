//! Factorial sweep: experiments × environments × repeats.

use fidelity_core::{
    ArParams, ConfigError, DesignError, Environment, ResolvedExperiment, RunReport,
    SimulationError, SweepConfig, Termination, init_population, run_report, run_rng,
};
use fidelity_storage::{RunMetadata, StorageError, SweepSink};
use rand::{SeedableRng, rngs::SmallRng};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that abort a sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error("run {run} failed: {source}")]
    Simulation {
        run: usize,
        #[source]
        source: SimulationError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("experiment {index} does not exist; design has {available}")]
    UnknownExperiment { index: usize, available: usize },
}

/// Tally of a finished sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub seed: u64,
    pub runs: usize,
    pub summaries: usize,
    pub completed: usize,
    pub collapsed: usize,
    pub overflowed: usize,
    pub stopped: usize,
}

impl SweepOutcome {
    fn record(&mut self, report: &RunReport) {
        self.runs += 1;
        self.summaries += report.summaries.len();
        match report.termination {
            Termination::Completed => self.completed += 1,
            Termination::Collapsed => self.collapsed += 1,
            Termination::Overflowed => self.overflowed += 1,
            Termination::Stopped => self.stopped += 1,
        }
    }
}

fn build_environment(
    config: &SweepConfig,
    experiment: &ResolvedExperiment,
    params: ArParams,
    rng: &mut SmallRng,
) -> Result<Environment, ConfigError> {
    Environment::generate(
        params,
        experiment.factors.by_lineage,
        config.population_size,
        config.generations,
        rng,
    )
}

fn simulate(
    config: &SweepConfig,
    experiment: &ResolvedExperiment,
    environment: &Environment,
    seed: u64,
    run: usize,
) -> Result<RunReport, SweepError> {
    let mut rng = run_rng(seed, run);
    let founders = init_population(config.population_size, &mut rng)
        .map_err(|err| SweepError::Simulation {
            run,
            source: err.into(),
        })?;
    run_report(
        experiment.factors,
        founders,
        config.generations,
        config.population_limit_multiplier,
        environment,
        &mut rng,
    )
    .map_err(|source| SweepError::Simulation { run, source })
}

/// Run every experiment of the design against `environments` random
/// environments, `repeats` times each, streaming output into `sink`.
///
/// The design is resolved up front, so a malformed experiment row fails
/// before any run starts.
pub fn run_sweep(
    config: &SweepConfig,
    sink: &mut dyn SweepSink,
) -> Result<SweepOutcome, SweepError> {
    config.validate()?;
    let experiments = config.design.resolve()?;
    let seed = config.resolve_seed();
    let total = config.total_runs();
    info!(
        seed,
        experiments = experiments.len(),
        environments = config.environments,
        repeats = config.repeats,
        total,
        "starting sweep",
    );

    let mut environment_rng = SmallRng::seed_from_u64(seed);
    let mut outcome = SweepOutcome {
        seed,
        ..SweepOutcome::default()
    };
    let mut run = 0;
    for experiment in &experiments {
        for _ in 0..config.environments {
            let params = ArParams::random(config.max_sd, &mut environment_rng)?;
            let environment = build_environment(config, experiment, params, &mut environment_rng)?;
            sink.on_environment(run, &environment)?;

            for _ in 0..config.repeats {
                let report = simulate(config, experiment, &environment, seed, run)?;
                let metadata = RunMetadata {
                    experiment: experiment.index,
                    run,
                    environment: params,
                    levels: experiment.levels.clone(),
                };
                sink.on_run(&metadata, &report.summaries)?;
                outcome.record(&report);
                run += 1;
                info!(
                    experiment = experiment.index,
                    termination = ?report.termination,
                    "run {run}/{total}",
                );
            }
        }
    }

    if outcome.collapsed + outcome.overflowed == outcome.runs {
        warn!(runs = outcome.runs, "no run reached the final generation");
    }
    info!(
        runs = outcome.runs,
        completed = outcome.completed,
        collapsed = outcome.collapsed,
        overflowed = outcome.overflowed,
        "sweep finished",
    );
    Ok(outcome)
}

/// Run one simulation of design row `experiment`.
///
/// Uses `params` when given, otherwise draws a random specification the way
/// the sweep does for its first environment.
pub fn single_run(
    config: &SweepConfig,
    experiment: usize,
    params: Option<ArParams>,
) -> Result<(ArParams, RunReport), SweepError> {
    config.validate()?;
    let experiments = config.design.resolve()?;
    let resolved = experiments
        .get(experiment)
        .ok_or(SweepError::UnknownExperiment {
            index: experiment,
            available: experiments.len(),
        })?;
    let seed = config.resolve_seed();
    let mut environment_rng = SmallRng::seed_from_u64(seed);
    let params = match params {
        Some(params) => params,
        None => ArParams::random(config.max_sd, &mut environment_rng)?,
    };
    let environment = build_environment(config, resolved, params, &mut environment_rng)?;
    let report = simulate(config, resolved, &environment, seed, 0)?;
    Ok((params, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidelity_core::{ExperimentDesign, GenerationSummary};
    use fidelity_storage::NullSink;

    fn small_config() -> SweepConfig {
        SweepConfig {
            generations: 6,
            population_size: 40,
            repeats: 2,
            environments: 2,
            rng_seed: Some(21),
            ..SweepConfig::default()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        environments: Vec<(usize, usize)>,
        runs: Vec<(RunMetadata, Vec<GenerationSummary>)>,
    }

    impl SweepSink for RecordingSink {
        fn on_environment(
            &mut self,
            run: usize,
            environment: &Environment,
        ) -> Result<(), StorageError> {
            self.environments.push((run, environment.series().len()));
            Ok(())
        }

        fn on_run(
            &mut self,
            metadata: &RunMetadata,
            summaries: &[GenerationSummary],
        ) -> Result<(), StorageError> {
            self.runs.push((metadata.clone(), summaries.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn sweep_visits_every_run_in_order() {
        let config = small_config();
        let mut sink = RecordingSink::default();
        let outcome = run_sweep(&config, &mut sink).expect("sweep");
        assert_eq!(outcome.runs, 4);
        assert_eq!(outcome.seed, 21);
        assert_eq!(
            outcome.completed + outcome.collapsed + outcome.overflowed + outcome.stopped,
            outcome.runs
        );
        assert_eq!(outcome.stopped, 0);
        let runs: Vec<usize> = sink.runs.iter().map(|(meta, _)| meta.run).collect();
        assert_eq!(runs, vec![0, 1, 2, 3]);
        assert_eq!(sink.environments, vec![(0, 1), (2, 1)]);
        assert_eq!(sink.runs[0].0.environment, sink.runs[1].0.environment);
        assert_ne!(sink.runs[0].0.environment, sink.runs[2].0.environment);
    }

    #[test]
    fn by_lineage_experiments_get_one_series_per_founder() {
        let mut config = small_config();
        config.design.experiments = vec![vec![1, 0, 0, 1, 1, 0]];
        let mut sink = RecordingSink::default();
        run_sweep(&config, &mut sink).expect("sweep");
        assert!(sink.environments.iter().all(|(_, rows)| *rows == 40));
    }

    #[test]
    fn seeded_sweeps_repeat_exactly() {
        let config = small_config();
        let mut first = RecordingSink::default();
        let mut second = RecordingSink::default();
        run_sweep(&config, &mut first).expect("sweep");
        run_sweep(&config, &mut second).expect("sweep");
        assert_eq!(first.runs.len(), second.runs.len());
        for ((meta_a, a), (meta_b, b)) in first.runs.iter().zip(&second.runs) {
            assert_eq!(meta_a, meta_b);
            assert_eq!(a.len(), b.len());
            assert!(a.iter().zip(b).all(|(x, y)| x.same_as(y)));
        }
    }

    #[test]
    fn malformed_design_fails_before_any_run() {
        let mut config = small_config();
        config.design = ExperimentDesign {
            experiments: vec![vec![0; 5]],
            ..ExperimentDesign::default()
        };
        let mut sink = RecordingSink::default();
        assert!(matches!(
            run_sweep(&config, &mut sink),
            Err(SweepError::Design(DesignError::ConfigurationMismatch { .. }))
        ));
        assert!(sink.environments.is_empty());
    }

    #[test]
    fn single_run_uses_requested_environment() {
        let config = small_config();
        let params = ArParams::new(0.0, 0.0, 0.0);
        let (used, report) = single_run(&config, 0, Some(params)).expect("run");
        assert_eq!(used, params);
        assert!(!report.summaries.is_empty());
        assert!(matches!(
            single_run(&config, 3, None),
            Err(SweepError::UnknownExperiment {
                index: 3,
                available: 1
            })
        ));
    }

    #[test]
    fn null_sink_accepts_a_sweep() {
        let outcome = run_sweep(&small_config(), &mut NullSink).expect("sweep");
        assert_eq!(outcome.runs, 4);
    }
}
