//! Sweep orchestration and configuration loading for the `fidelity` binary.

pub mod settings;
pub mod sweep;

pub use settings::{SweepOverrides, load_config, resolve_config};
pub use sweep::{SweepError, SweepOutcome, run_sweep, single_run};
