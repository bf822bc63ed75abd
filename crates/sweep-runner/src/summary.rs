//! Per-configuration statistics over a written result table.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Solvers report a cost at or above this when they found no tour.
pub const UNSOLVED_COST_THRESHOLD: f64 = 1e30;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultMatrix {
    pub configs: Vec<String>,
    pub rows: Vec<(usize, Vec<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub config: String,
    pub samples: usize,
    pub unsolved: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum TableFormatError {
    #[error("result table is empty")]
    Empty,
    #[error("header declares {declared} configurations but lists {listed}")]
    HeaderCount { declared: String, listed: usize },
    #[error("line {line}: expected {expected} fields, found {found}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: `{value}` is not a number")]
    InvalidValue { line: usize, value: String },
}

pub fn read_table(path: &Path) -> Result<ResultMatrix> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read result table {}", path.display()))?;
    parse_table(&raw).with_context(|| format!("malformed result table {}", path.display()))
}

pub fn parse_table(raw: &str) -> Result<ResultMatrix, TableFormatError> {
    let mut lines = raw
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = lines.next().ok_or(TableFormatError::Empty)?;
    let mut fields = header.split(',').map(str::trim);
    let declared = fields.next().unwrap_or_default();
    let configs: Vec<String> = fields.map(str::to_string).collect();
    if declared.parse::<usize>().ok() != Some(configs.len()) {
        return Err(TableFormatError::HeaderCount {
            declared: declared.to_string(),
            listed: configs.len(),
        });
    }

    let mut rows = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != configs.len() + 1 {
            return Err(TableFormatError::RowWidth {
                line: line_no,
                expected: configs.len() + 1,
                found: fields.len(),
            });
        }
        let instance = parse_cell::<usize>(line_no, fields[0])?;
        let values = fields[1..]
            .iter()
            .map(|v| parse_cell::<f64>(line_no, v))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((instance, values));
    }
    Ok(ResultMatrix { configs, rows })
}

fn parse_cell<T: std::str::FromStr>(line: usize, raw: &str) -> Result<T, TableFormatError> {
    raw.parse::<T>().map_err(|_| TableFormatError::InvalidValue {
        line,
        value: raw.to_string(),
    })
}

/// Unsolved entries are counted separately and kept out of mean/min/max.
pub fn summarize(matrix: &ResultMatrix) -> Vec<ColumnStats> {
    matrix
        .configs
        .iter()
        .enumerate()
        .map(|(col, config)| {
            let column: Vec<f64> = matrix.rows.iter().map(|(_, v)| v[col]).collect();
            let solved: Vec<f64> = column
                .iter()
                .copied()
                .filter(|v| *v < UNSOLVED_COST_THRESHOLD)
                .collect();
            let mean = if solved.is_empty() {
                None
            } else {
                Some(solved.iter().sum::<f64>() / solved.len() as f64)
            };
            ColumnStats {
                config: config.clone(),
                samples: column.len(),
                unsolved: column.len() - solved.len(),
                mean,
                min: solved.iter().copied().reduce(f64::min),
                max: solved.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_written_table() {
        let matrix = parse_table("2,2,3\n0,10.0,20.0\n1,30.0,40.0\n").expect("table");
        assert_eq!(matrix.configs, vec!["2", "3"]);
        assert_eq!(matrix.rows, vec![(0, vec![10.0, 20.0]), (1, vec![30.0, 40.0])]);
    }

    #[test]
    fn rejects_inconsistent_tables() {
        assert_eq!(parse_table(""), Err(TableFormatError::Empty));
        assert!(matches!(
            parse_table("3,2,3\n"),
            Err(TableFormatError::HeaderCount { listed: 2, .. })
        ));
        assert_eq!(
            parse_table("2,2,3\n0,1.0\n"),
            Err(TableFormatError::RowWidth {
                line: 2,
                expected: 3,
                found: 2
            })
        );
        assert!(matches!(
            parse_table("1,2\n0,abc\n"),
            Err(TableFormatError::InvalidValue { line: 2, .. })
        ));
    }

    #[test]
    fn summary_excludes_unsolved_entries() {
        let matrix = parse_table("2,tabu,vns\n0,10.0,1e+31\n1,30.0,5.0\n2,20.0,1e31\n")
            .expect("table");
        let stats = summarize(&matrix);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].config, "tabu");
        assert_eq!(stats[0].samples, 3);
        assert_eq!(stats[0].unsolved, 0);
        assert_eq!(stats[0].mean, Some(20.0));
        assert_eq!(stats[0].min, Some(10.0));
        assert_eq!(stats[0].max, Some(30.0));
        assert_eq!(stats[1].unsolved, 2);
        assert_eq!(stats[1].mean, Some(5.0));
    }

    #[test]
    fn header_only_table_has_empty_columns() {
        let stats = summarize(&parse_table("1,4\n").expect("table"));
        assert_eq!(stats[0].samples, 0);
        assert_eq!(stats[0].mean, None);
    }
}
