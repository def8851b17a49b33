//! Record binding: resolve a record's leading token against the registry and
//! write its values into the model.
//!
//! Failures are per record. A batch keeps going after a bad line and every
//! failure ends up in the `IngestReport`.

use crate::domain::model::{IngestReport, Model, Record, RecordError};
use crate::domain::registry::{SeriesKind, SeriesSlot, PERIOD_LABEL};
use crate::utils::error::BindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// A `LATA` record established the period count.
    PeriodLabels(usize),
    /// A declared array series was stored.
    Series(SeriesSlot),
    /// Too few tokens, or a scalar field with no binding rule yet.
    Ignored,
}

/// Bind one record into the model.
pub fn bind(model: &mut Model, record: &Record) -> Result<BindOutcome, BindError> {
    if record.token_count() < 2 {
        return Ok(BindOutcome::Ignored);
    }

    if record.name == PERIOD_LABEL {
        return bind_period_labels(model, record);
    }

    let slot = SeriesSlot::lookup(&record.name).ok_or_else(|| BindError::UnknownVariable {
        name: record.name.clone(),
    })?;

    match slot.kind() {
        SeriesKind::Count => {
            tracing::debug!("Scalar field {} has no binding rule, skipping", slot);
            Ok(BindOutcome::Ignored)
        }
        SeriesKind::Array => {
            let n = model
                .period_count()
                .ok_or_else(|| BindError::PeriodCountNotSet {
                    name: record.name.clone(),
                })?;
            let values = fill_forward(&record.name, &record.values, n)?;
            model.set_series(slot, values);
            Ok(BindOutcome::Series(slot))
        }
    }
}

fn bind_period_labels(model: &mut Model, record: &Record) -> Result<BindOutcome, BindError> {
    let attempted = record.values.len();
    if let Some(current) = model.period_count() {
        return Err(BindError::PeriodCountAlreadySet { current, attempted });
    }

    let labels = record
        .values
        .iter()
        .map(|token| parse_value(&record.name, token))
        .collect::<Result<Vec<_>, _>>()?;

    model.set_period_count(attempted);
    model.set_series(SeriesSlot::PeriodLabels, labels);
    Ok(BindOutcome::PeriodLabels(attempted))
}

/// Build an `n`-element array from the given tokens. Missing trailing values
/// repeat the last supplied one; tokens past `n` are ignored.
pub fn fill_forward(name: &str, tokens: &[String], n: usize) -> Result<Vec<f64>, BindError> {
    let mut values: Vec<f64> = Vec::with_capacity(n);
    for i in 0..n {
        let value = match (tokens.get(i), values.last()) {
            (Some(token), _) => parse_value(name, token)?,
            (None, Some(&previous)) => previous,
            (None, None) => {
                return Err(BindError::MissingFirstValue {
                    name: name.to_string(),
                })
            }
        };
        values.push(value);
    }
    Ok(values)
}

fn parse_value(name: &str, token: &str) -> Result<f64, BindError> {
    token.parse::<f64>().map_err(|_| BindError::InvalidNumber {
        name: name.to_string(),
        token: token.to_string(),
    })
}

/// Bind a batch of records, reporting failures without stopping.
pub fn ingest_records<I>(model: &mut Model, records: I) -> IngestReport
where
    I: IntoIterator<Item = Record>,
{
    let mut report = IngestReport::default();

    for record in records {
        report.lines_read += 1;
        match bind(model, &record) {
            Ok(BindOutcome::Ignored) => report.records_ignored += 1,
            Ok(outcome) => {
                tracing::debug!("Line {}: bound {:?}", record.line, outcome);
                report.records_bound += 1;
            }
            Err(error) => {
                tracing::warn!("Line {}: {}", record.line, error);
                report.errors.push(RecordError {
                    line: record.line,
                    name: record.name.clone(),
                    error,
                });
            }
        }
    }

    report
}

/// Split text into records and bind them. Blank lines are skipped.
pub fn ingest_str(model: &mut Model, text: &str) -> IngestReport {
    let records = parse_records(text);
    let blank_lines = text.lines().count() - records.len();
    let mut report = ingest_records(model, records);
    report.lines_read += blank_lines;
    report.records_ignored += blank_lines;
    report
}

pub fn parse_records(text: &str) -> Vec<Record> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| Record::parse(idx + 1, line))
        .collect()
}
