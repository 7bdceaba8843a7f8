//! Delimited-text output for simulation sweeps.
//!
//! Result rows join run metadata with a [`GenerationSummary`]; columns are
//! ordered by sorted name and the header is written once, before the first
//! row.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};
use fidelity_core::{ArParams, Environment, GenerationSummary};
use thiserror::Error;
use tracing::debug;

/// Storage error wrapper.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("result columns changed: expected {expected:?}, got {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Identifies the run a block of summaries belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub experiment: usize,
    pub run: usize,
    pub environment: ArParams,
    /// Level index of every design factor.
    pub levels: BTreeMap<&'static str, usize>,
}

impl RunMetadata {
    /// Metadata and summary fields merged and sorted by column name.
    #[must_use]
    pub fn row(&self, summary: &GenerationSummary) -> BTreeMap<String, String> {
        let mut row = BTreeMap::new();
        row.insert("experiment".to_string(), self.experiment.to_string());
        row.insert("run".to_string(), self.run.to_string());
        row.insert("ar_theta".to_string(), self.environment.theta.to_string());
        row.insert("ar_sd".to_string(), self.environment.sd.to_string());
        row.insert("ar_bias".to_string(), self.environment.bias.to_string());
        for (name, value) in summary.columns() {
            row.insert(name.to_string(), value);
        }
        for (name, level) in &self.levels {
            row.insert((*name).to_string(), level.to_string());
        }
        row
    }
}

/// Receives sweep output as it is produced.
pub trait SweepSink {
    /// Persist the environment matrix used by `run` and the repeats after it.
    fn on_environment(
        &mut self,
        run: usize,
        environment: &Environment,
    ) -> Result<(), StorageError>;

    /// Persist the summaries of one completed run.
    fn on_run(
        &mut self,
        metadata: &RunMetadata,
        summaries: &[GenerationSummary],
    ) -> Result<(), StorageError>;
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl SweepSink for NullSink {
    fn on_environment(
        &mut self,
        _run: usize,
        _environment: &Environment,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    fn on_run(
        &mut self,
        _metadata: &RunMetadata,
        _summaries: &[GenerationSummary],
    ) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Writes result rows as CSV, emitting the header before the first row.
#[derive(Debug)]
pub struct ResultsWriter<W: Write> {
    writer: Writer<W>,
    header: Option<Vec<String>>,
    rows: usize,
}

impl ResultsWriter<File> {
    /// Create (or truncate) a results file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> ResultsWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: WriterBuilder::new().has_headers(false).from_writer(inner),
            header: None,
            rows: 0,
        }
    }

    /// Rows written so far, excluding the header.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Write one row per summary.
    pub fn write_run(
        &mut self,
        metadata: &RunMetadata,
        summaries: &[GenerationSummary],
    ) -> Result<(), StorageError> {
        for summary in summaries {
            let row = metadata.row(summary);
            match &self.header {
                None => {
                    let header: Vec<String> = row.keys().cloned().collect();
                    self.writer.write_record(&header)?;
                    self.header = Some(header);
                }
                Some(header) if !header.iter().eq(row.keys()) => {
                    return Err(StorageError::ColumnMismatch {
                        expected: header.clone(),
                        actual: row.keys().cloned().collect(),
                    });
                }
                Some(_) => {}
            }
            self.writer.write_record(row.values())?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, StorageError> {
        self.writer
            .into_inner()
            .map_err(|err| StorageError::Io(err.into_error()))
    }
}

/// Path of the environment file for `run` inside `dir`.
#[must_use]
pub fn environment_path(dir: &Path, run: usize) -> PathBuf {
    dir.join(format!("environments{run}.csv"))
}

/// Write an environment matrix as rows of `run,lineage,t0,...,tn`.
pub fn write_environment<W: Write>(
    inner: W,
    run: usize,
    environment: &Environment,
) -> Result<(), StorageError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
    for (lineage, series) in environment.series().iter().enumerate() {
        let mut record = Vec::with_capacity(series.len() + 2);
        record.push(run.to_string());
        record.push(lineage.to_string());
        record.extend(series.iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write an environment catalog as rows of `theta,sd,bias,v0,...,vn`.
pub fn write_catalog<W: Write>(
    inner: W,
    catalog: &[(ArParams, Vec<f64>)],
) -> Result<(), StorageError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(inner);
    for (params, series) in catalog {
        let mut record = Vec::with_capacity(series.len() + 3);
        record.push(params.theta.to_string());
        record.push(params.sd.to_string());
        record.push(params.bias.to_string());
        record.extend(series.iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// File-backed sink: one results CSV plus one environment CSV per environment.
#[derive(Debug)]
pub struct CsvSink {
    results: ResultsWriter<File>,
    environment_dir: PathBuf,
}

impl CsvSink {
    /// Create `results.csv` and the `environments/` directory under `output_dir`.
    pub fn create(output_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let output_dir = output_dir.as_ref();
        let environment_dir = output_dir.join("environments");
        fs::create_dir_all(&environment_dir)?;
        let results = ResultsWriter::create(output_dir.join("results.csv"))?;
        Ok(Self {
            results,
            environment_dir,
        })
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.results.flush()
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.results.rows()
    }
}

impl SweepSink for CsvSink {
    fn on_environment(
        &mut self,
        run: usize,
        environment: &Environment,
    ) -> Result<(), StorageError> {
        let path = environment_path(&self.environment_dir, run);
        debug!(
            path = %path.display(),
            series = environment.series().len(),
            "writing environment",
        );
        write_environment(File::create(path)?, run, environment)
    }

    fn on_run(
        &mut self,
        metadata: &RunMetadata,
        summaries: &[GenerationSummary],
    ) -> Result<(), StorageError> {
        self.results.write_run(metadata, summaries)
    }
}
