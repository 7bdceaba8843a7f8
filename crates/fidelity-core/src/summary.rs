//! Per-generation population statistics.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Count, mean and sample standard deviation of both traits for one generation.
///
/// Fields are declared in sorted serialized-name order so that serializers
/// emit a stable column order. Means are `NaN` for an empty population and
/// standard deviations are `NaN` below two entities; serde writes that
/// sentinel as the string `"NaN"`, the same text the CSV output uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationSummary {
    #[serde(with = "nan_text")]
    pub ave_fid: f64,
    #[serde(with = "nan_text")]
    pub ave_fit: f64,
    #[serde(rename = "gen")]
    pub generation: usize,
    #[serde(rename = "pop")]
    pub population: usize,
    #[serde(with = "nan_text")]
    pub sd_fid: f64,
    #[serde(with = "nan_text")]
    pub sd_fit: f64,
}

/// Floats that serialize `NaN` as the string `"NaN"` instead of `null`.
mod nan_text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    const NAN: &str = "NaN";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str(NAN)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) if text == NAN => Ok(f64::NAN),
            Repr::Text(text) => Err(D::Error::custom(format!(
                "expected a number or \"{NAN}\", found {text:?}"
            ))),
        }
    }
}

impl GenerationSummary {
    /// Serialized column names, sorted.
    pub const COLUMNS: [&'static str; 6] = ["ave_fid", "ave_fit", "gen", "pop", "sd_fid", "sd_fit"];

    /// Column/value pairs in [`Self::COLUMNS`] order. `NaN` renders as `NaN`.
    #[must_use]
    pub fn columns(&self) -> [(&'static str, String); 6] {
        [
            ("ave_fid", self.ave_fid.to_string()),
            ("ave_fit", self.ave_fit.to_string()),
            ("gen", self.generation.to_string()),
            ("pop", self.population.to_string()),
            ("sd_fid", self.sd_fid.to_string()),
            ("sd_fit", self.sd_fit.to_string()),
        ]
    }

    /// Bitwise comparison that treats matching `NaN` sentinels as equal.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.generation == other.generation
            && self.population == other.population
            && self.ave_fid.to_bits() == other.ave_fid.to_bits()
            && self.ave_fit.to_bits() == other.ave_fit.to_bits()
            && self.sd_fid.to_bits() == other.sd_fid.to_bits()
            && self.sd_fit.to_bits() == other.sd_fit.to_bits()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let avg = mean(values);
    let squares: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

/// Summarize a population snapshot. The record is labeled `generation_index + 1`.
#[must_use]
pub fn summarize(population: &[Entity], generation_index: usize) -> GenerationSummary {
    let fitness: Vec<f64> = population.iter().map(Entity::fitness).collect();
    let fidelity: Vec<f64> = population.iter().map(Entity::fidelity).collect();
    GenerationSummary {
        ave_fid: mean(&fidelity),
        ave_fit: mean(&fitness),
        generation: generation_index + 1,
        population: population.len(),
        sd_fid: sample_sd(&fidelity),
        sd_fit: sample_sd(&fitness),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Lineage;

    fn entity(fitness: f64, fidelity: f64) -> Entity {
        Entity::new(Lineage(0), fitness, fidelity).expect("entity")
    }

    #[test]
    fn two_entities_report_mean_and_sample_sd() {
        let summary = summarize(&[entity(0.2, 0.4), entity(0.8, 0.4)], 0);
        assert_eq!(summary.generation, 1);
        assert_eq!(summary.population, 2);
        assert!((summary.ave_fit - 0.5).abs() < 1e-12);
        assert!((summary.ave_fid - 0.4).abs() < 1e-12);
        assert!((summary.sd_fit - 0.18_f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary.sd_fid, 0.0);
    }

    #[test]
    fn single_entity_has_no_spread() {
        let summary = summarize(&[entity(0.3, 0.6)], 4);
        assert_eq!(summary.generation, 5);
        assert_eq!(summary.ave_fit, 0.3);
        assert!(summary.sd_fit.is_nan());
        assert!(summary.sd_fid.is_nan());
    }

    #[test]
    fn empty_population_has_no_mean() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.population, 0);
        assert!(summary.ave_fit.is_nan());
        assert!(summary.ave_fid.is_nan());
        assert!(summary.sd_fit.is_nan());
    }

    #[test]
    fn columns_follow_sorted_names() {
        let summary = summarize(&[entity(0.5, 0.5)], 2);
        let columns = summary.columns();
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, GenerationSummary::COLUMNS);
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert_eq!(columns[2].1, "3");
        assert_eq!(columns[4].1, "NaN");
    }

    #[test]
    fn json_uses_short_field_names() {
        let summary = summarize(&[entity(0.5, 0.5), entity(0.5, 0.5)], 0);
        let json = serde_json::to_string(&summary).expect("json");
        assert!(json.starts_with("{\"ave_fid\":"));
        assert!(json.contains("\"gen\":1"));
        assert!(json.contains("\"pop\":2"));
    }

    #[test]
    fn json_lines_keep_the_nan_sentinel() {
        let summary = summarize(&[entity(0.4, 0.6)], 0);
        let json = serde_json::to_string(&summary).expect("json");
        assert!(json.contains("\"sd_fid\":\"NaN\""));
        assert!(json.contains("\"sd_fit\":\"NaN\""));
        assert!(!json.contains("null"));

        let decoded: GenerationSummary = serde_json::from_str(&json).expect("decode");
        assert!(decoded.same_as(&summary));

        let garbled = json.replace("\"sd_fid\":\"NaN\"", "\"sd_fid\":\"nope\"");
        assert!(serde_json::from_str::<GenerationSummary>(&garbled).is_err());
    }
}
