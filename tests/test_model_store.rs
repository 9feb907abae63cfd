//! Integration tests for model persistence

use chrono::{Duration, NaiveDate};
use demand_forecast::prelude::*;
use demand_forecast::timeseries::{design_matrix, future_rows};
use std::collections::BTreeSet;

fn trained_engine() -> ForecastEngine {
    let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let series = CanonicalSeries::from_points((0..24 * 10).map(|i| {
        let hour = (i % 24) as f64;
        (start + Duration::hours(i), 500.0 + 25.0 * hour + ((i / 24) % 7) as f64 * 10.0)
    }));
    let prototype = XGBoostRegressor::new(XGBoostConfig {
        n_estimators: 50,
        learning_rate: 0.2,
        log_every: 0,
        ..Default::default()
    });
    let mut engine = ForecastEngine::new(series, prototype).with_deriver(FeatureDeriver::new([1, 2, 3]));
    engine.train(&SplitConfig::new(3, 24, 0)).unwrap();
    engine
}

#[test]
fn test_predictions_survive_round_trip_bit_for_bit() {
    let engine = trained_engine();
    let model = engine.model().unwrap();

    // Fixed sample: two days past the history, the second one without lag1
    let first = engine.series().last().unwrap() + Duration::hours(1);
    let hours: BTreeSet<_> = (0..48).map(|h| first + Duration::hours(h)).collect();
    let rows = future_rows(&model.deriver().derive(engine.series(), Some(&hours)));
    let x = design_matrix(&rows, &model.features);
    assert!(x.iter().any(|v| v.is_nan()));

    let expected = model.regressor.predict(&x).unwrap();

    for format in [ModelFormat::Json, ModelFormat::Binary] {
        let store = ModelStore::new(format);
        let restored: TrainedModel = store.load(&store.save(model).unwrap()).unwrap();
        let actual = restored.regressor.predict(&x).unwrap();
        let same = expected.iter().zip(actual.iter()).all(|(a, b)| a.to_bits() == b.to_bits());
        assert!(same, "{:?} artifact changed predictions", format);
        assert_eq!(restored.lag_offsets_days, [1, 2, 3]);
    }
}

#[test]
fn test_loaded_model_drives_a_fresh_engine() {
    let engine = trained_engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let store = ModelStore::new(ModelFormat::Binary);
    store.save_to_path(engine.model().unwrap(), &path).unwrap();

    let mut fresh = ForecastEngine::new(engine.series().clone(), XGBoostRegressor::default());
    fresh.set_model(store.load_from_path(&path).unwrap());

    let start = engine.series().last().unwrap() - Duration::hours(3);
    let end = start + Duration::hours(30);
    assert_eq!(fresh.predict_range(start, end).unwrap(), engine.predict_range(start, end).unwrap());
    assert_eq!(fresh.scores(), engine.scores());
}

#[test]
fn test_truncated_artifact_is_rejected() {
    let engine = trained_engine();
    let store = ModelStore::new(ModelFormat::Json);
    let bytes = store.save(engine.model().unwrap()).unwrap();

    let truncated = &bytes[..bytes.len() / 2];
    let result: demand_forecast::Result<TrainedModel> = store.load(truncated);
    assert!(matches!(result, Err(ForecastError::Serialization(_))));
}
