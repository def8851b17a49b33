use model_sim::core::bridge::ScriptBridge;
use model_sim::domain::bindings::{Bindings, Value};
use model_sim::domain::registry::SeriesSlot;
use model_sim::utils::error::ScriptError;
use model_sim::{ModelSimError, ScriptEngine, Session};
use std::time::Duration;

const MODEL: &str = "\
LATA 2020 2021 2022
twKI 1.0 1.1 1.2
twKS 1
twINW 1
twEKS 1
twIMP 1
KI 100
KS 0
INW 0
EKS 0
IMP 0
";

fn loaded() -> Session<ScriptEngine> {
    let mut session = Session::new(ScriptEngine::default());
    assert!(session.load_str(MODEL).is_clean());
    session
}

#[test]
fn test_export_carries_count_inputs_and_results() {
    let mut session = loaded();
    session.run().unwrap();
    session.apply_script("EXTRA = [1, 2, 3]").unwrap();

    let bindings = ScriptBridge::export(session.model());
    let names: Vec<&str> = bindings.iter().map(|(name, _)| name).collect();
    assert_eq!(
        names,
        vec![
            "LL", "twKI", "twKS", "twINW", "twEKS", "twIMP", "KI", "KS", "INW", "EKS", "IMP",
            "PKB", "EXTRA"
        ]
    );
    assert_eq!(bindings.get("LL"), Some(&Value::Number(3.0)));
}

#[test]
fn test_loop_and_index_assignment() {
    let mut session = loaded();
    session.run().unwrap();

    let report = session
        .apply_script(
            "GROWTH = zeros(LL)
             for t in 1..LL {
                 GROWTH[t] = PKB[t] / PKB[t - 1] - 1
             }",
        )
        .unwrap();

    assert_eq!(report.dynamic, vec!["GROWTH"]);
    assert_eq!(report.skipped, vec!["LL", "t"]);
    let growth = session.model().get("GROWTH").unwrap();
    assert_eq!(growth[0], 0.0);
    assert!((growth[1] - 0.1).abs() < 1e-12);
    assert!((growth[2] - 0.2).abs() < 1e-12);
}

#[test]
fn test_script_overrides_growth_then_rerun() {
    let mut session = loaded();
    session.apply_script("twKI = cumprod(fill(LL, 1))\nif LL > 2 { twKI[2] = 1.5 }").unwrap();
    session.run().unwrap();

    assert_eq!(
        session.model().series(SeriesSlot::Aggregate),
        Some(&[100.0, 100.0, 150.0][..])
    );
}

#[test]
fn test_wrong_length_declared_array_is_rejected() {
    let mut session = loaded();
    let report = session.apply_script("KS = [1, 2]\nLL = [1, 2, 3]\nODD = [1]").unwrap();

    assert_eq!(report.rejected, vec!["LL", "KS"]);
    assert_eq!(report.dynamic, vec!["ODD"]);
    assert_eq!(session.model().series(SeriesSlot::Ks), Some(&[0.0, 0.0, 0.0][..]));
    assert_eq!(session.model().period_count(), Some(3));
}

#[test]
fn test_failed_script_imports_nothing() {
    let mut session = loaded();
    let err = session.apply_script("A = [1, 2, 3]\nB = A + [1, 2]").unwrap_err();

    assert!(matches!(
        err,
        ModelSimError::Script(ScriptError::LengthMismatch { line: 2, left: 3, right: 2 })
    ));
    assert!(session.model().dynamic_series().is_empty());
}

#[test]
fn test_runaway_script_hits_step_budget() {
    let mut session = Session::new(ScriptEngine::new(None, 1_000));
    session.load_str(MODEL);

    let err = session
        .apply_script("X = 0\nfor i in 0..1000000 { X = X + 1 }")
        .unwrap_err();
    assert!(matches!(
        err,
        ModelSimError::Script(ScriptError::StepLimit { limit: 1_000 })
    ));
}

#[test]
fn test_runaway_script_hits_deadline() {
    let engine = ScriptEngine::new(Some(Duration::from_millis(1)), u64::MAX);
    let mut session = Session::new(engine);
    session.load_str(MODEL);

    let err = session
        .apply_script("X = 0\nfor i in 0..1000000000 { X = X + 1 }")
        .unwrap_err();
    assert!(matches!(
        err,
        ModelSimError::Script(ScriptError::Timeout { limit_ms: 1 })
    ));
}

#[test]
fn test_scalars_are_not_imported() {
    let mut model = model_sim::Model::new();
    let mut bindings = Bindings::new();
    bindings.set("TOTAL", Value::Number(5.0));
    bindings.set("SERIES", Value::Array(vec![1.0]));

    let report = ScriptBridge::import(&mut model, bindings);
    assert_eq!(report.skipped, vec!["TOTAL"]);
    assert_eq!(model.get("SERIES"), Some(&[1.0][..]));
    assert_eq!(model.get("TOTAL"), None);
}
