use thiserror::Error;

/// Pretty-printing artifact the solver may leave inside its result record.
const WRAP_ARTIFACT: &str = "\n ";

/// The `(time, cost)` pair one solver invocation reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessResult {
    pub time: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// No line carries a `;`. `first_line` is the first non-blank line the
    /// solver did print, usually a diagnostic.
    #[error("no `<time>;<cost>` record in solver output{}", stray_suffix(.first_line))]
    MissingRecord { first_line: Option<String> },
    #[error("result record `{record}` has {found} fields, expected `<time>;<cost>`")]
    TooManyFields { record: String, found: usize },
    #[error("result field `{field}` is not a number: `{value}`")]
    InvalidNumber { field: &'static str, value: String },
}

fn stray_suffix(first_line: &Option<String>) -> String {
    match first_line {
        Some(line) => format!(" (solver printed `{}`)", line),
        None => " (output was empty)".to_string(),
    }
}

/// Extracts the result record from a solver's captured stdout.
///
/// The record is the first line carrying a `;` separator.
pub fn parse_result(raw: &str) -> Result<ProcessResult, ParseError> {
    let cleaned = raw.replace(WRAP_ARTIFACT, "");
    let record = match cleaned.lines().find(|l| l.contains(';')) {
        Some(line) => line.trim(),
        None => {
            return Err(ParseError::MissingRecord {
                first_line: cleaned
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string),
            })
        }
    };

    let fields: Vec<&str> = record.split(';').collect();
    if fields.len() > 2 {
        return Err(ParseError::TooManyFields {
            record: record.to_string(),
            found: fields.len(),
        });
    }

    Ok(ProcessResult {
        time: parse_field("time", fields[0])?,
        cost: parse_field("cost", fields[1])?,
    })
}

fn parse_field(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber {
            field,
            value: raw.trim().to_string(),
        })
}
