use model_sim::core::binder::{bind, fill_forward, ingest_str, BindOutcome};
use model_sim::core::bridge::ScriptBridge;
use model_sim::core::engine::SimulationEngine;
use model_sim::core::formatter::format_value;
use model_sim::domain::model::Record;
use model_sim::domain::registry::SeriesSlot;
use model_sim::Model;
use proptest::prelude::*;

fn tokens(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A complete dataset where only the KI family grows.
fn dataset(growth: &[f64], base: f64) -> String {
    let labels: Vec<f64> = (0..growth.len()).map(|i| 2000.0 + i as f64).collect();
    format!(
        "LATA {}\ntwKI {}\ntwKS 1\ntwINW 1\ntwEKS 1\ntwIMP 1\nKI {}\nKS 0\nINW 0\nEKS 0\nIMP 0\n",
        tokens(&labels),
        tokens(growth),
        base
    )
}

proptest! {
    #[test]
    fn period_count_equals_label_tokens(labels in prop::collection::vec(1900u32..2100, 1..40)) {
        let mut model = Model::new();
        let line = format!("LATA {}", labels.iter().map(u32::to_string).collect::<Vec<_>>().join(" "));
        let record = Record::parse(1, &line).unwrap();

        prop_assert_eq!(bind(&mut model, &record), Ok(BindOutcome::PeriodLabels(labels.len())));
        prop_assert_eq!(model.period_count(), Some(labels.len()));
    }

    #[test]
    fn short_records_fill_forward(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 1..10),
        extra in 0usize..10,
    ) {
        let n = values.len() + extra;
        let given: Vec<String> = values.iter().map(f64::to_string).collect();
        let filled = fill_forward("KI", &given, n).unwrap();

        prop_assert_eq!(filled.len(), n);
        prop_assert_eq!(&filled[..values.len()], &values[..]);
        let last = values[values.len() - 1];
        prop_assert!(filled[values.len()..].iter().all(|v| *v == last));
    }

    #[test]
    fn base_follows_cumulative_growth(
        growth in prop::collection::vec(0.5f64..1.5, 1..25),
        base in 1.0f64..1000.0,
    ) {
        let mut model = Model::new();
        prop_assert!(ingest_str(&mut model, &dataset(&growth, base)).is_clean());
        SimulationEngine::run(&mut model).unwrap();

        let ki = model.series(SeriesSlot::Ki).unwrap();
        let mut expected = base;
        for t in 1..growth.len() {
            expected *= growth[t];
            prop_assert!((ki[t] - expected).abs() <= 1e-9 * expected.abs().max(1.0));
        }
        prop_assert_eq!(model.series(SeriesSlot::Aggregate), Some(ki));
    }

    #[test]
    fn rerun_is_idempotent(growth in prop::collection::vec(0.5f64..1.5, 1..15)) {
        let mut model = Model::new();
        ingest_str(&mut model, &dataset(&growth, 100.0));
        SimulationEngine::run(&mut model).unwrap();
        let first = model.clone();
        SimulationEngine::run(&mut model).unwrap();

        prop_assert_eq!(model, first);
    }

    #[test]
    fn unmodified_round_trip_keeps_model(growth in prop::collection::vec(0.5f64..1.5, 1..15)) {
        let mut model = Model::new();
        ingest_str(&mut model, &dataset(&growth, 100.0));
        SimulationEngine::run(&mut model).unwrap();
        let before = model.clone();

        let bindings = ScriptBridge::export(&model);
        let report = ScriptBridge::import(&mut model, bindings);

        prop_assert!(report.rejected.is_empty());
        prop_assert_eq!(model, before);
    }

    #[test]
    fn value_tiers_pick_precision(value in -1.0e7f64..1.0e7) {
        let rendered = format_value(value);
        let decimals = rendered.split('.').nth(1).map(str::len);
        let expected = if value >= 100.0 {
            1
        } else if value > 1.0 {
            2
        } else {
            5
        };
        prop_assert_eq!(decimals, Some(expected));
    }
}
