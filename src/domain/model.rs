use crate::domain::registry::SeriesSlot;
use crate::utils::error::BindError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One input line split into its name token and value tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based source line.
    pub line: usize,
    pub name: String,
    pub values: Vec<String>,
}

impl Record {
    /// Split a line on arbitrary whitespace. Blank lines yield `None`.
    pub fn parse(line: usize, text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let name = tokens.next()?.to_string();
        Some(Self {
            line,
            name,
            values: tokens.map(str::to_string).collect(),
        })
    }

    /// Total token count including the name.
    pub fn token_count(&self) -> usize {
        self.values.len() + 1
    }
}

/// All series of one loaded dataset.
///
/// Declared series live in typed slots; anything introduced by a script goes
/// into `dynamic`, which keeps insertion order for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    period_count: Option<usize>,
    declared: HashMap<SeriesSlot, Vec<f64>>,
    dynamic: IndexMap<String, Vec<f64>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period_count(&self) -> Option<usize> {
        self.period_count
    }

    pub(crate) fn set_period_count(&mut self, n: usize) {
        self.period_count = Some(n);
    }

    pub fn series(&self, slot: SeriesSlot) -> Option<&[f64]> {
        self.declared.get(&slot).map(Vec::as_slice)
    }

    /// Replace a declared series. No length check happens here.
    pub fn set_series(&mut self, slot: SeriesSlot, values: Vec<f64>) {
        self.declared.insert(slot, values);
    }

    pub fn period_labels(&self) -> Option<&[f64]> {
        self.series(SeriesSlot::PeriodLabels)
    }

    pub fn dynamic_series(&self) -> &IndexMap<String, Vec<f64>> {
        &self.dynamic
    }

    /// Insert or replace a dynamic series. Replacing keeps the original position.
    pub fn set_dynamic_series(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.dynamic.insert(name.into(), values);
    }

    /// Resolve a name against the declared slots first, then dynamic series.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        match SeriesSlot::lookup(name) {
            Some(slot) => self.series(slot),
            None => self.dynamic.get(name).map(Vec::as_slice),
        }
    }
}

/// A record that failed to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordError {
    pub line: usize,
    pub name: String,
    pub error: BindError,
}

/// Outcome of ingesting one batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub lines_read: usize,
    pub records_bound: usize,
    pub records_ignored: usize,
    pub errors: Vec<RecordError>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Outcome of importing a post-evaluation environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Declared series replaced by the script.
    pub declared: Vec<String>,
    /// Dynamic series introduced or replaced.
    pub dynamic: Vec<String>,
    /// Scalar bindings that were left out.
    pub skipped: Vec<String>,
    /// Declared-name arrays refused because their length differs from the period count.
    pub rejected: Vec<String>,
}

/// One rendered result document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub extension: &'static str,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub ingest: IngestReport,
    pub import: Option<ImportReport>,
    pub simulated: bool,
    pub table: String,
    pub outputs: Vec<RenderedOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parse_splits_on_any_whitespace() {
        let record = Record::parse(3, "  twKI\t1.0   1.1 \t 1.2  ").unwrap();
        assert_eq!(record.line, 3);
        assert_eq!(record.name, "twKI");
        assert_eq!(record.values, vec!["1.0", "1.1", "1.2"]);
        assert_eq!(record.token_count(), 4);
    }

    #[test]
    fn test_record_parse_blank_line() {
        assert!(Record::parse(1, "   \t ").is_none());
        assert!(Record::parse(1, "").is_none());
    }

    #[test]
    fn test_dynamic_series_keep_insertion_order() {
        let mut model = Model::new();
        model.set_dynamic_series("b", vec![1.0]);
        model.set_dynamic_series("a", vec![2.0]);
        model.set_dynamic_series("b", vec![3.0]);

        let names: Vec<_> = model.dynamic_series().keys().cloned().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(model.get("b"), Some(&[3.0][..]));
    }

    #[test]
    fn test_get_prefers_declared_slot() {
        let mut model = Model::new();
        model.set_series(SeriesSlot::Ki, vec![100.0]);
        assert_eq!(model.get("KI"), Some(&[100.0][..]));
        assert_eq!(model.get("PKB"), None);
    }
}
