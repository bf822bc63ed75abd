use crate::grid::{ConfigId, Task};
use crate::parse::ProcessResult;
use crate::scheduler::{TaskError, TaskOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Scalar written into the result matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Time,
    #[default]
    Cost,
}

impl Metric {
    pub fn select(self, result: &ProcessResult) -> f64 {
        match self {
            Metric::Time => result.time,
            Metric::Cost => result.cost,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Time => "time",
            Metric::Cost => "cost",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "time" => Ok(Metric::Time),
            "cost" => Ok(Metric::Cost),
            other => Err(TableError::UnknownMetric(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("task {task} failed: {source}")]
    TaskFailed {
        task: Task,
        #[source]
        source: TaskError,
    },
    #[error("task {0} reported more than once")]
    Duplicate(Task),
    #[error("no result recorded for instance {instance}, config {config}")]
    MissingResult { instance: usize, config: ConfigId },
    #[error("unknown metric `{0}` (expected `time` or `cost`)")]
    UnknownMetric(String),
}

/// Owns the results of one run, keyed by task identity.
#[derive(Debug)]
pub struct Aggregator {
    instances: usize,
    configs: Vec<ConfigId>,
    results: HashMap<Task, ProcessResult>,
}

impl Aggregator {
    pub fn new(instances: usize, configs: Vec<ConfigId>) -> Self {
        let capacity = instances * configs.len();
        Self {
            instances,
            configs,
            results: HashMap::with_capacity(capacity),
        }
    }

    /// Merges one drained block. Successful outcomes are recorded even when
    /// a sibling failed; the first failure in task order is returned.
    pub fn absorb_block(&mut self, outcomes: Vec<TaskOutcome>) -> Result<usize, TableError> {
        let mut first_failure = None;
        let mut merged = 0;
        for TaskOutcome { task, result } in outcomes {
            match result {
                Ok(value) => {
                    if self.results.contains_key(&task) {
                        return Err(TableError::Duplicate(task));
                    }
                    self.results.insert(task, value);
                    merged += 1;
                }
                Err(source) => {
                    if first_failure.is_none() {
                        first_failure = Some(TableError::TaskFailed { task, source });
                    }
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(merged),
        }
    }

    pub fn get(&self, instance: usize, config: &ConfigId) -> Option<&ProcessResult> {
        self.results.get(&Task::new(instance, config.clone()))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Header `<k>,<c1>,..,<ck>`, then one `<instance>,<v1>,..` line per
    /// instance, columns in declared configuration order.
    pub fn render(&self, metric: Metric) -> Result<String, TableError> {
        let mut out = String::new();
        out.push_str(&self.configs.len().to_string());
        for config in &self.configs {
            out.push(',');
            out.push_str(&config.to_string());
        }
        out.push('\n');

        for instance in 0..self.instances {
            out.push_str(&instance.to_string());
            for config in &self.configs {
                let result =
                    self.get(instance, config)
                        .ok_or_else(|| TableError::MissingResult {
                            instance,
                            config: config.clone(),
                        })?;
                out.push(',');
                out.push_str(&format_metric(metric.select(result)));
            }
            out.push('\n');
        }
        Ok(out)
    }
}

/// Renders a metric the way the downstream plotting scripts print floats:
/// integral values keep their `.0` and exponents carry a sign and at least
/// two digits (`1e+31`, `2.5e-05`).
pub fn format_metric(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let repr = format!("{:?}", value);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}

/// Writes the rendered table next to its destination and renames it into
/// place, so a reader sees either the previous table or the complete new one.
/// The partial file is removed if anything before the rename fails.
pub fn write_table_atomic(path: &Path, table: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    let partial = dir.join(format!(
        ".{}.partial.{}.{}",
        name,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));

    let written = fs::File::create(&partial).and_then(|file| {
        let mut out = BufWriter::new(file);
        out.write_all(table.as_bytes())?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()
    });
    let renamed = written.and_then(|()| fs::rename(&partial, path));
    if let Err(err) = renamed {
        let _ = fs::remove_file(&partial);
        return Err(err).with_context(|| format!("failed to write table {}", path.display()));
    }
    Ok(())
}
