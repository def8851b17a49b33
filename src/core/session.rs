//! One loaded dataset and the operations a front-end drives against it:
//! load, run, run a script, read the results.

use crate::core::binder::{ingest_records, ingest_str};
use crate::core::bridge::ScriptBridge;
use crate::core::engine::{SimSummary, SimulationEngine};
use crate::core::formatter::format_table;
use crate::domain::model::{ImportReport, IngestReport, Model, Record};
use crate::domain::ports::ScriptEvaluator;
use crate::utils::error::Result;

pub struct Session<E: ScriptEvaluator> {
    model: Model,
    evaluator: E,
}

impl<E: ScriptEvaluator> Session<E> {
    pub fn new(evaluator: E) -> Self {
        Self {
            model: Model::new(),
            evaluator,
        }
    }

    /// Replace the current dataset with the contents of `text`.
    pub fn load_str(&mut self, text: &str) -> IngestReport {
        self.model = Model::new();
        let report = ingest_str(&mut self.model, text);
        log_ingest(&report);
        report
    }

    /// Replace the current dataset with already split records.
    pub fn load_records(&mut self, records: Vec<Record>) -> IngestReport {
        self.model = Model::new();
        let report = ingest_records(&mut self.model, records);
        log_ingest(&report);
        report
    }

    pub fn simulate(&mut self) -> Result<SimSummary> {
        Ok(SimulationEngine::run(&mut self.model)?)
    }

    /// Run the projection and render the result table.
    pub fn run(&mut self) -> Result<String> {
        self.simulate()?;
        Ok(self.results())
    }

    pub fn apply_script(&mut self, script: &str) -> Result<ImportReport> {
        let report = ScriptBridge::run_script(&mut self.model, &self.evaluator, script)?;
        tracing::info!(
            "Script imported {} declared and {} dynamic series",
            report.declared.len(),
            report.dynamic.len()
        );
        Ok(report)
    }

    /// Evaluate a script, import its arrays and render the result table.
    pub fn run_script(&mut self, script: &str) -> Result<String> {
        self.apply_script(script)?;
        Ok(self.results())
    }

    pub fn results(&self) -> String {
        format_table(&self.model)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

fn log_ingest(report: &IngestReport) {
    tracing::info!(
        "Ingested {} lines: {} bound, {} ignored, {} rejected",
        report.lines_read,
        report.records_bound,
        report.records_ignored,
        report.errors.len()
    );
}
