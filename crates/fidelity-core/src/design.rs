//! Two-level factor table and experiment rows.
//!
//! An experiment row holds one level index (0 or 1) per factor, ordered by
//! sorted factor name as listed in [`FACTOR_NAMES`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::factors::{Factors, ProbabilityPolicy};

/// Factor names in sorted order; experiment rows follow this order.
pub const FACTOR_NAMES: [&str; 6] = [
    "BY_LINEAGE",
    "CORRELATED",
    "N_OFFSPRING",
    "P_REPRODUCE",
    "P_SELECTION",
    "RESTRICTION",
];

/// Errors raised while resolving experiment rows.
#[derive(Debug, Error, PartialEq)]
pub enum DesignError {
    #[error("experiment {experiment} has {actual} levels, factor schema has {expected}")]
    ConfigurationMismatch {
        experiment: usize,
        expected: usize,
        actual: usize,
    },
    #[error("experiment {experiment} uses level {level} for {factor}; only 0 and 1 exist")]
    InvalidLevel {
        experiment: usize,
        factor: &'static str,
        level: usize,
    },
    #[error("design has no experiments")]
    Empty,
}

/// Low/high values of every factor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FactorTable {
    pub by_lineage: [bool; 2],
    pub correlated: [bool; 2],
    pub n_offspring: [u32; 2],
    /// `0` selects fitness-proportional reproduction.
    pub p_reproduce: [f64; 2],
    /// `0` selects fitness-proportional selection.
    pub p_selection: [f64; 2],
    /// Recorded with results; the engine always caps at the founding size.
    pub restriction: [bool; 2],
}

impl Default for FactorTable {
    fn default() -> Self {
        Self {
            by_lineage: [false, true],
            correlated: [false, true],
            n_offspring: [2, 5],
            p_reproduce: [0.0, 0.66],
            p_selection: [0.0, 0.66],
            restriction: [false, true],
        }
    }
}

/// Experiment row resolved against a [`FactorTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExperiment {
    pub index: usize,
    pub factors: Factors,
    /// Level index per factor name, for reporting.
    pub levels: BTreeMap<&'static str, usize>,
}

impl FactorTable {
    /// Resolve one experiment row into engine factors.
    pub fn resolve(
        &self,
        experiment: usize,
        row: &[usize],
    ) -> Result<ResolvedExperiment, DesignError> {
        if row.len() != FACTOR_NAMES.len() {
            return Err(DesignError::ConfigurationMismatch {
                experiment,
                expected: FACTOR_NAMES.len(),
                actual: row.len(),
            });
        }
        if let Some((&factor, &level)) = FACTOR_NAMES.iter().zip(row).find(|(_, level)| **level > 1)
        {
            return Err(DesignError::InvalidLevel {
                experiment,
                factor,
                level,
            });
        }
        let [by_lineage, correlated, n_offspring, p_reproduce, p_selection, _restriction] =
            [row[0], row[1], row[2], row[3], row[4], row[5]];
        let factors = Factors {
            reproduction: ProbabilityPolicy::from_level_value(self.p_reproduce[p_reproduce]),
            selection: ProbabilityPolicy::from_level_value(self.p_selection[p_selection]),
            max_offspring: self.n_offspring[n_offspring],
            correlated: self.correlated[correlated],
            by_lineage: self.by_lineage[by_lineage],
        };
        Ok(ResolvedExperiment {
            index: experiment,
            factors,
            levels: FACTOR_NAMES.iter().copied().zip(row.iter().copied()).collect(),
        })
    }
}

/// A factor table plus the experiment rows to sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentDesign {
    pub factors: FactorTable,
    pub experiments: Vec<Vec<usize>>,
}

impl Default for ExperimentDesign {
    fn default() -> Self {
        Self {
            factors: FactorTable::default(),
            experiments: vec![vec![0, 1, 0, 0, 0, 1]],
        }
    }
}

impl ExperimentDesign {
    /// 2^(6-3) fractional factorial over all six factors.
    #[must_use]
    pub fn fractional() -> Self {
        Self {
            factors: FactorTable::default(),
            experiments: vec![
                vec![0, 0, 0, 1, 1, 1],
                vec![1, 0, 0, 0, 0, 1],
                vec![0, 1, 0, 0, 1, 0],
                vec![1, 1, 0, 1, 0, 0],
                vec![0, 0, 1, 1, 0, 0],
                vec![1, 0, 1, 0, 1, 0],
                vec![0, 1, 1, 0, 0, 1],
                vec![1, 1, 1, 1, 1, 1],
            ],
        }
    }

    /// Resolve every row, failing on the first row that does not fit the schema.
    pub fn resolve(&self) -> Result<Vec<ResolvedExperiment>, DesignError> {
        if self.experiments.is_empty() {
            return Err(DesignError::Empty);
        }
        self.experiments
            .iter()
            .enumerate()
            .map(|(idx, row)| self.factors.resolve(idx, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_names_are_sorted() {
        let mut sorted = FACTOR_NAMES;
        sorted.sort_unstable();
        assert_eq!(sorted, FACTOR_NAMES);
    }

    #[test]
    fn default_experiment_resolves() {
        let resolved = ExperimentDesign::default().resolve().expect("design");
        assert_eq!(resolved.len(), 1);
        let experiment = &resolved[0];
        assert_eq!(experiment.factors.reproduction, ProbabilityPolicy::FitnessProportional);
        assert_eq!(experiment.factors.selection, ProbabilityPolicy::FitnessProportional);
        assert_eq!(experiment.factors.max_offspring, 2);
        assert!(experiment.factors.correlated);
        assert!(!experiment.factors.by_lineage);
        assert_eq!(experiment.levels["RESTRICTION"], 1);
        assert_eq!(experiment.levels["BY_LINEAGE"], 0);
    }

    #[test]
    fn high_levels_resolve_to_fixed_probabilities() {
        let table = FactorTable::default();
        let resolved = table.resolve(3, &[1, 1, 1, 1, 1, 1]).expect("row");
        assert_eq!(resolved.index, 3);
        assert_eq!(resolved.factors.reproduction, ProbabilityPolicy::Fixed(0.66));
        assert_eq!(resolved.factors.selection, ProbabilityPolicy::Fixed(0.66));
        assert_eq!(resolved.factors.max_offspring, 5);
        assert!(resolved.factors.by_lineage);
    }

    #[test]
    fn mismatched_rows_fail_fast() {
        let design = ExperimentDesign {
            factors: FactorTable::default(),
            experiments: vec![vec![0; 6], vec![0; 7]],
        };
        assert_eq!(
            design.resolve(),
            Err(DesignError::ConfigurationMismatch {
                experiment: 1,
                expected: 6,
                actual: 7
            })
        );

        let table = FactorTable::default();
        assert_eq!(
            table.resolve(0, &[0, 0, 2, 0, 0, 0]),
            Err(DesignError::InvalidLevel {
                experiment: 0,
                factor: "N_OFFSPRING",
                level: 2
            })
        );
    }

    #[test]
    fn fractional_design_is_balanced() {
        let design = ExperimentDesign::fractional();
        let resolved = design.resolve().expect("design");
        assert_eq!(resolved.len(), 8);
        for column in 0..FACTOR_NAMES.len() {
            let high: usize = design.experiments.iter().map(|row| row[column]).sum();
            assert_eq!(high, 4, "column {column} unbalanced");
        }
    }

    #[test]
    fn table_round_trips_through_json_names() {
        let json = serde_json::to_value(FactorTable::default()).expect("json");
        assert_eq!(json["P_REPRODUCE"][1], 0.66);
        assert_eq!(json["N_OFFSPRING"][0], 2);
    }
}
