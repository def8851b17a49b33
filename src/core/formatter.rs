//! Result rendering.
//!
//! The table format is one row per series, space separated:
//!
//! ```text
//! LATA 2020 2021 2022
//! twKI 1.00000 1.10 1.20
//! ...
//! PKB 100.0 110.0 132.0
//! ```
//!
//! Presentation front-ends split it on newlines then spaces, so the layout is
//! fixed: no padding, no header beyond the `LATA` row.

use crate::domain::model::{Model, RenderedOutput};
use crate::domain::registry::{SeriesSlot, PERIOD_LABEL};
use crate::utils::error::{ModelSimError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl OutputFormat {
    pub const VALID: [&'static str; 3] = ["table", "csv", "json"];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Table => "txt",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    pub fn render(self, model: &Model) -> Result<RenderedOutput> {
        let content = match self {
            OutputFormat::Table => format_table(model),
            OutputFormat::Csv => format_csv(model)?,
            OutputFormat::Json => format_json(model)?,
        };
        Ok(RenderedOutput {
            extension: self.extension(),
            content,
        })
    }
}

impl FromStr for OutputFormat {
    type Err = ModelSimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "txt" | "tsv" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(ModelSimError::InvalidConfigValueError {
                field: "output.formats".to_string(),
                value: other.to_string(),
                reason: format!("Unsupported format. Valid formats: {}", Self::VALID.join(", ")),
            }),
        }
    }
}

/// Magnitude-tiered rendering: `>= 100` one decimal, `(1, 100)` two, else five.
pub fn format_value(value: f64) -> String {
    if value >= 100.0 {
        format_fixed(value, 1)
    } else if value > 1.0 {
        format_fixed(value, 2)
    } else {
        format_fixed(value, 5)
    }
}

/// Round the shortest decimal form of `value` half-up (away from zero) to
/// `places` fraction digits, so `2.675` renders as `2.68`.
pub fn format_fixed(value: f64, places: usize) -> String {
    if !value.is_finite() {
        return format!("{:.*}", places, value);
    }

    let shortest = value.abs().to_string();
    let (int_part, frac_part) = shortest.split_once('.').unwrap_or((&shortest, ""));
    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().chain(std::iter::repeat(b'0')).take(places))
        .map(|c| c - b'0')
        .collect();

    if frac_part.as_bytes().get(places).is_some_and(|c| *c >= b'5') {
        let mut carry = true;
        for digit in digits.iter_mut().rev() {
            if *digit == 9 {
                *digit = 0;
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, 1);
        }
    }

    let split = digits.len() - places;
    let mut out = String::with_capacity(digits.len() + 2);
    if value.is_sign_negative() {
        out.push('-');
    }
    for (i, digit) in digits.iter().enumerate() {
        if i == split {
            out.push('.');
        }
        out.push(char::from(b'0' + digit));
    }
    out
}

/// Period labels are years; they print truncated toward zero.
pub fn format_label(label: f64) -> String {
    (label as i64).to_string()
}

/// Series rows in display order: the fixed declared list, then dynamic
/// series in insertion order. Each name appears once.
pub fn report_rows(model: &Model) -> Vec<(&str, Option<&[f64]>)> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for slot in SeriesSlot::REPORT_ORDER {
        if seen.insert(slot.name()) {
            rows.push((slot.name(), model.series(slot)));
        }
    }
    for (name, values) in model.dynamic_series() {
        if seen.insert(name.as_str()) {
            rows.push((name.as_str(), Some(values.as_slice())));
        }
    }

    rows
}

pub fn format_table(model: &Model) -> String {
    let mut out = String::from(PERIOD_LABEL);
    for label in model.period_labels().unwrap_or_default() {
        out.push(' ');
        out.push_str(&format_label(*label));
    }
    out.push('\n');

    for (name, values) in report_rows(model) {
        out.push_str(name);
        for value in values.unwrap_or_default() {
            out.push(' ');
            out.push_str(&format_value(*value));
        }
        out.push('\n');
    }

    out
}

pub fn format_csv(model: &Model) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let mut header = vec!["series".to_string()];
    header.extend(model.period_labels().unwrap_or_default().iter().map(|l| format_label(*l)));
    writer.write_record(&header)?;

    for (name, values) in report_rows(model) {
        let mut row = vec![name.to_string()];
        row.extend(values.unwrap_or_default().iter().map(|v| format_value(*v)));
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| ModelSimError::ProcessingError {
        message: format!("Failed to flush CSV output: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| ModelSimError::ProcessingError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}

#[derive(Serialize)]
struct ResultDocument<'a> {
    periods: Vec<i64>,
    series: Vec<SeriesEntry<'a>>,
}

#[derive(Serialize)]
struct SeriesEntry<'a> {
    name: &'a str,
    values: Option<&'a [f64]>,
}

/// Raw values, unrounded. Unset series carry `null`.
pub fn format_json(model: &Model) -> Result<String> {
    let document = ResultDocument {
        periods: model
            .period_labels()
            .unwrap_or_default()
            .iter()
            .map(|l| *l as i64)
            .collect(),
        series: report_rows(model)
            .into_iter()
            .map(|(name, values)| SeriesEntry { name, values })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}
