/// Tabular row filter
///
/// Filters a tab-delimited file with a boolean condition over its columns.
/// Column types are inferred once from the first data line; rows that cannot
/// be coerced to those types, or whose condition fails to evaluate, are
/// skipped and reported.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// Condition parsing and evaluation
pub mod condition;

pub use condition::{Condition, Value};

/// Failures that stop the filter before or while writing output
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Usage: filter_rows input_file output_file condition")]
    Usage,

    #[error("Cannot recognize the word {word} in condition {condition}")]
    UnknownWord { word: String, condition: String },

    #[error("Invalid condition {condition}: {reason}")]
    InvalidCondition { condition: String, reason: String },

    #[error("The input data file \"{}\" does not exist.", .0.display())]
    InputMissing(PathBuf),

    #[error("No non-blank or non-comment lines in input data file \"{}\"", .0.display())]
    NoDataLines(PathBuf),

    #[error("This tool can only be run on tab delimited files")]
    NotTabDelimited,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Float,
    Str,
}

fn parse_float(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

/// Each field that parses as a number makes its column numeric
pub fn infer_column_types(fields: &[&str]) -> Vec<ColumnType> {
    fields
        .iter()
        .map(|field| match parse_float(field) {
            Some(_) => ColumnType::Float,
            None => ColumnType::Str,
        })
        .collect()
}

/// Convert raw fields to typed values; `None` when the row does not fit
pub fn coerce_row(fields: &[&str], types: &[ColumnType]) -> Option<Vec<Value>> {
    if fields.len() != types.len() {
        return None;
    }

    fields
        .iter()
        .zip(types)
        .map(|(field, column_type)| match column_type {
            ColumnType::Float => parse_float(field).map(Value::Num),
            ColumnType::Str => Some(Value::Str(field.to_string())),
        })
        .collect()
}

/// Data lines are non-blank after trimming and not comments
fn data_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    (!trimmed.is_empty() && !trimmed.starts_with('#')).then_some(trimmed)
}

/// Outcome of a filter run
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSummary {
    /// Condition after escape tokens were replaced
    pub condition: String,
    pub kept: usize,
    pub total: usize,
    pub skipped: usize,
    /// 1-based line number and trimmed content of the first skipped line
    pub first_invalid: Option<(usize, String)>,
}

impl FilterSummary {
    pub fn kept_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.kept as f64 / self.total as f64
        }
    }
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filtering with {}, ", self.condition)?;
        write!(
            f,
            "kept {:4.2}% of {} original lines.  ",
            self.kept_percent(),
            self.total
        )?;
        if let Some((line_number, line)) = &self.first_invalid {
            write!(
                f,
                "\nSkipped {} invalid lines in file starting with line # {}, data: {}",
                self.skipped, line_number, line
            )?;
        }
        Ok(())
    }
}

/// Filter `input` into `output`, keeping the lines satisfying `condition_text`
pub fn run_filter(
    input: &Path,
    output: &Path,
    condition_text: &str,
) -> Result<FilterSummary, FilterError> {
    let condition_text = condition::unescape(condition_text);
    condition::check_safe_words(&condition_text)?;

    if !input.exists() {
        return Err(FilterError::InputMissing(input.to_path_buf()));
    }
    let bytes = fs::read(input)?;
    // raw lines are written back untouched; decoding is only for parsing
    let raw_lines: Vec<&[u8]> = bytes.split_inclusive(|&b| b == b'\n').collect();
    let lines: Vec<Cow<'_, str>> = raw_lines
        .iter()
        .map(|raw| String::from_utf8_lossy(raw))
        .collect();

    let first = lines
        .iter()
        .find_map(|line| data_line(line))
        .ok_or_else(|| FilterError::NoDataLines(input.to_path_buf()))?;
    let fields: Vec<&str> = first.split('\t').collect();
    if fields.len() == 1 && first.split_whitespace().count() != 1 {
        return Err(FilterError::NotTabDelimited);
    }
    let types = infer_column_types(&fields);
    tracing::debug!("Inferred column types: {:?}", types);

    let condition = Condition::compile(&condition_text, types.len())?;

    let mut writer = io::BufWriter::new(fs::File::create(output)?);
    let mut kept = 0;
    let mut skipped = 0;
    let mut first_invalid = None;

    for (index, (decoded, raw_line)) in lines.iter().zip(&raw_lines).enumerate() {
        let Some(line) = data_line(decoded) else {
            continue;
        };

        let fields: Vec<&str> = line.split('\t').collect();
        let verdict = coerce_row(&fields, &types)
            .ok_or(())
            .and_then(|row| condition.matches(&row).map_err(|e| {
                tracing::debug!("Line {} failed evaluation: {}", index + 1, e);
            }));

        match verdict {
            Ok(true) => {
                writer.write_all(raw_line)?;
                kept += 1;
            }
            Ok(false) => {}
            Err(()) => {
                skipped += 1;
                if first_invalid.is_none() {
                    first_invalid = Some((index + 1, line.to_string()));
                }
            }
        }
    }
    writer.flush()?;

    Ok(FilterSummary {
        condition: condition_text,
        kept,
        total: lines.len(),
        skipped,
        first_invalid,
    })
}
