//! Export/import protocol between the model and a script evaluator.
//!
//! Export hands the evaluator `LL`, the growth and base series, `PKB` once a
//! run has produced it, and every dynamic series. After evaluation, each
//! array-valued binding is read back: declared names replace their slot, any
//! other name becomes a dynamic series. Scalars are never imported.

use crate::domain::bindings::{Bindings, Value};
use crate::domain::model::{ImportReport, Model};
use crate::domain::ports::ScriptEvaluator;
use crate::domain::registry::{SeriesKind, SeriesSlot, PERIOD_COUNT};
use crate::utils::error::ScriptError;

pub struct ScriptBridge;

impl ScriptBridge {
    pub fn export(model: &Model) -> Bindings {
        let mut bindings = Bindings::new();
        bindings.set(
            PERIOD_COUNT,
            Value::Number(model.period_count().unwrap_or(0) as f64),
        );

        let exported = SeriesSlot::GROWTH
            .iter()
            .chain(SeriesSlot::BASE.iter())
            .chain(std::iter::once(&SeriesSlot::Aggregate));
        for slot in exported {
            if let Some(values) = model.series(*slot) {
                bindings.set(slot.name(), Value::Array(values.to_vec()));
            }
        }

        for (name, values) in model.dynamic_series() {
            bindings.set(name.clone(), Value::Array(values.clone()));
        }

        tracing::debug!("Exported {} bindings", bindings.len());
        bindings
    }

    pub fn import(model: &mut Model, bindings: Bindings) -> ImportReport {
        let mut report = ImportReport::default();
        let n = model.period_count();

        for (name, value) in bindings {
            let values = match value {
                Value::Array(values) => values,
                Value::Number(_) => {
                    report.skipped.push(name);
                    continue;
                }
            };
            let length_ok = n.map_or(true, |n| values.len() == n);

            match SeriesSlot::lookup(&name) {
                Some(slot) if slot.kind() == SeriesKind::Array => {
                    if !length_ok {
                        tracing::warn!(
                            "Refusing to overwrite {} with {} values (period count is {:?})",
                            name,
                            values.len(),
                            n
                        );
                        report.rejected.push(name);
                        continue;
                    }
                    model.set_series(slot, values);
                    report.declared.push(name);
                }
                Some(_) => {
                    tracing::warn!("{} is a scalar field and cannot hold an array", name);
                    report.rejected.push(name);
                }
                None => {
                    if !length_ok {
                        tracing::warn!(
                            "Dynamic series {} has {} values (period count is {:?})",
                            name,
                            values.len(),
                            n
                        );
                    }
                    model.set_dynamic_series(name.clone(), values);
                    report.dynamic.push(name);
                }
            }
        }

        tracing::debug!(
            "Imported {} declared and {} dynamic series",
            report.declared.len(),
            report.dynamic.len()
        );
        report
    }

    /// Export, evaluate, import. A failed evaluation imports nothing.
    pub fn run_script<E: ScriptEvaluator + ?Sized>(
        model: &mut Model,
        evaluator: &E,
        script: &str,
    ) -> Result<ImportReport, ScriptError> {
        let bindings = Self::export(model);
        let after = evaluator.evaluate(script, bindings)?;
        Ok(Self::import(model, after))
    }
}
