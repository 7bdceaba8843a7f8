use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fidelity_app::{SweepOverrides, resolve_config, run_sweep, single_run};
use fidelity_core::{ArParams, factorial_catalog, random_catalog};
use fidelity_storage::{CsvSink, write_catalog};
use rand::{SeedableRng, rngs::SmallRng};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "fidelity",
    version,
    about = "Simulate how fitness and reproductive fidelity co-evolve under environmental noise"
)]
struct Cli {
    /// JSON sweep configuration; defaults apply when omitted.
    #[arg(long, global = true, env = "FIDELITY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full factorial sweep and write CSV results.
    Sweep {
        /// Directory receiving results.csv and environments/.
        #[arg(long, env = "FIDELITY_OUTPUT", default_value = "results")]
        output: PathBuf,
        #[command(flatten)]
        overrides: SweepOverrides,
    },
    /// Run one simulation and print its summaries as JSON lines.
    Run {
        /// Design row to run.
        #[arg(long, default_value_t = 0)]
        experiment: usize,
        /// AR feedback coefficient; with --sd and --bias replaces the random draw.
        #[arg(long, requires_all = ["sd", "bias"])]
        theta: Option<f64>,
        #[arg(long, requires_all = ["theta", "bias"])]
        sd: Option<f64>,
        #[arg(long, requires_all = ["theta", "sd"])]
        bias: Option<f64>,
        #[command(flatten)]
        overrides: SweepOverrides,
    },
    /// Generate an environment catalog.
    Environments {
        #[arg(long, value_enum, default_value_t = CatalogKind::Random)]
        kind: CatalogKind,
        /// Specifications in a random catalog.
        #[arg(long, default_value_t = 20)]
        count: usize,
        /// Values per series.
        #[arg(long, default_value_t = 50)]
        length: usize,
        #[arg(long, default_value_t = 0.3)]
        max_sd: f64,
        #[arg(long, env = "FIDELITY_SEED")]
        seed: Option<u64>,
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the resolved configuration as JSON.
    ShowConfig {
        #[command(flatten)]
        overrides: SweepOverrides,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CatalogKind {
    Random,
    Factorial,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Sweep { output, overrides } => {
            let config = resolve_config(config_path, &overrides)?;
            let mut sink = CsvSink::create(&output)
                .with_context(|| format!("failed to open results in {}", output.display()))?;
            let outcome = run_sweep(&config, &mut sink).context("sweep aborted")?;
            sink.flush().context("failed to flush results")?;
            info!(
                seed = outcome.seed,
                runs = outcome.runs,
                rows = sink.rows(),
                output = %output.display(),
                "results written",
            );
        }
        Command::Run {
            experiment,
            theta,
            sd,
            bias,
            overrides,
        } => {
            let config = resolve_config(config_path, &overrides)?;
            let params = match (theta, sd, bias) {
                (Some(theta), Some(sd), Some(bias)) => Some(ArParams::new(theta, sd, bias)),
                _ => None,
            };
            let (params, report) = single_run(&config, experiment, params).context("run failed")?;
            info!(
                theta = params.theta,
                sd = params.sd,
                bias = params.bias,
                termination = ?report.termination,
                "single run finished",
            );
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for summary in &report.summaries {
                serde_json::to_writer(&mut out, summary)?;
                writeln!(out)?;
            }
            out.flush()?;
        }
        Command::Environments {
            kind,
            count,
            length,
            max_sd,
            seed,
            output,
        } => {
            let mut rng = SmallRng::seed_from_u64(seed.unwrap_or_else(rand::random));
            let catalog = match kind {
                CatalogKind::Random => random_catalog(count, max_sd, length, &mut rng)?,
                CatalogKind::Factorial => factorial_catalog(max_sd, length, &mut rng)?,
            };
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    write_catalog(file, &catalog)?;
                    info!(entries = catalog.len(), path = %path.display(), "catalog written");
                }
                None => write_catalog(io::stdout().lock(), &catalog)?,
            }
        }
        Command::ShowConfig { overrides } => {
            let config = resolve_config(config_path, &overrides)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}
