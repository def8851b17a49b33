//! Growth-factor projection.
//!
//! Period 0 sums the base stocks as given. Every later period first advances
//! each base by its growth factor, then recombines:
//!
//! ```text
//! base[t]  = growth[t] * base[t-1]
//! PKB[t]   = KI[t] + KS[t] + INW[t] + EKS[t] - IMP[t]
//! ```
//!
//! Overflow and NaN are not guarded; they propagate into later periods.

use crate::domain::model::Model;
use crate::domain::registry::SeriesSlot;
use crate::utils::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSummary {
    pub periods: usize,
    pub first: f64,
    pub last: f64,
}

pub struct SimulationEngine;

impl SimulationEngine {
    /// Run the projection in place. Inputs are checked before anything is
    /// written, so an error leaves the model as it was.
    pub fn run(model: &mut Model) -> Result<SimSummary, SimError> {
        let n = model.period_count().ok_or(SimError::PeriodCountNotSet)?;
        for slot in SeriesSlot::GROWTH.iter().chain(SeriesSlot::BASE.iter()) {
            check_series(model, *slot, n)?;
        }

        let growth: Vec<Vec<f64>> = SeriesSlot::GROWTH
            .iter()
            .map(|slot| model.series(*slot).map(<[f64]>::to_vec).unwrap_or_default())
            .collect();
        let mut bases: Vec<Vec<f64>> = SeriesSlot::BASE
            .iter()
            .map(|slot| model.series(*slot).map(<[f64]>::to_vec).unwrap_or_default())
            .collect();

        let mut aggregate = vec![0.0; n];
        aggregate[0] = combine(&bases, 0);
        for t in 1..n {
            for (base, growth) in bases.iter_mut().zip(&growth) {
                base[t] = growth[t] * base[t - 1];
            }
            aggregate[t] = combine(&bases, t);
        }

        for (slot, values) in SeriesSlot::BASE.iter().zip(bases) {
            model.set_series(*slot, values);
        }
        let summary = SimSummary {
            periods: n,
            first: aggregate[0],
            last: aggregate[n - 1],
        };
        model.set_series(SeriesSlot::Aggregate, aggregate);

        tracing::info!(
            "Simulated {} periods (PKB {:.1} -> {:.1})",
            summary.periods,
            summary.first,
            summary.last
        );
        Ok(summary)
    }
}

fn check_series(model: &Model, slot: SeriesSlot, n: usize) -> Result<(), SimError> {
    let values = model.series(slot).ok_or_else(|| SimError::MissingSeries {
        name: slot.name().to_string(),
    })?;
    if values.len() != n {
        return Err(SimError::LengthMismatch {
            name: slot.name().to_string(),
            expected: n,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Sum of the first four components minus the last.
fn combine(bases: &[Vec<f64>], t: usize) -> f64 {
    match bases.split_last() {
        Some((imports, rest)) => rest.iter().map(|base| base[t]).sum::<f64>() - imports[t],
        None => 0.0,
    }
}
