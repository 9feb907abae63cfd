//! Integration tests for the forecasting pipeline: normalize, derive, validate, predict

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use demand_forecast::prelude::*;
use demand_forecast::timeseries::{decode_hour, plan_folds};
use std::io::Write;

fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

fn demand_at(ts: NaiveDateTime) -> f64 {
    let hour = ts.hour() as f64;
    let weekday = ts.weekday().num_days_from_monday() as f64;
    let season = (ts.ordinal() as f64 / 365.0 * std::f64::consts::TAU).cos();
    1000.0 + 300.0 * (hour / 24.0 * std::f64::consts::TAU).sin() - 40.0 * weekday + 150.0 * season
}

fn raw_records(start: NaiveDateTime, hours: i64) -> Vec<RawRecord> {
    (0..hours)
        .map(|i| {
            let ts = start + Duration::hours(i);
            RawRecord::new(
                ts.format("%d/%m/%Y").to_string(),
                format!("{:02}", ts.hour() + 1),
                demand_at(ts),
            )
        })
        .collect()
}

fn small_regressor() -> XGBoostRegressor {
    XGBoostRegressor::new(XGBoostConfig {
        n_estimators: 30,
        learning_rate: 0.3,
        early_stopping_rounds: Some(10),
        log_every: 0,
        ..Default::default()
    })
}

// ============================================================================
// Normalization
// ============================================================================

#[test]
fn test_hour_labels_decode_in_order() {
    let hours: Vec<u32> = (1..=24).map(|l| decode_hour(&format!("{:02}", l)).unwrap()).collect();
    assert_eq!(hours[0], 0);
    assert!(hours.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*hours.last().unwrap(), 23);
    assert!(matches!(decode_hour("25"), Err(ForecastError::InvalidHour { .. })));
}

#[test]
fn test_two_days_normalize_to_48_hours() {
    let mut records = Vec::new();
    for date in ["14/03/2026", "15/03/2026"] {
        for label in 1..=24 {
            records.push(RawRecord::new(date, format!("{:02}", label), label as f64));
        }
    }
    records.reverse();

    let series = TimeSeriesNormalizer::new().normalize(&records).unwrap();
    assert_eq!(series.len(), 48);
    assert_eq!(series.first(), Some(midnight(2026, 3, 14)));
    assert_eq!(series.last(), Some(midnight(2026, 3, 15) + Duration::hours(23)));
    let stamps: Vec<_> = series.timestamps().collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));

    let again = TimeSeriesNormalizer::new().normalize(&series.to_raw_records()).unwrap();
    assert_eq!(again, series);
}

#[test]
fn test_duplicate_policy_is_explicit() {
    let records = vec![
        RawRecord::new("01/01/2025", "01", 1.0),
        RawRecord::new("2025-01-01", "01", 2.0),
    ];
    assert!(matches!(
        TimeSeriesNormalizer::new().normalize(&records),
        Err(ForecastError::DuplicateTimestamp(_))
    ));

    let series = TimeSeriesNormalizer::new()
        .with_duplicate_policy(DuplicatePolicy::LastWriteWins)
        .normalize(&records)
        .unwrap();
    assert_eq!(series.get(&midnight(2025, 1, 1)), Some(2.0));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_fold_windows_expand_and_respect_gap() {
    let config = SplitConfig::new(5, 24 * 30, 24);
    let folds = plan_folds(24 * 200, &config);
    assert_eq!(folds.len(), 5);
    for pair in folds.windows(2) {
        assert!(pair[1].train.start <= pair[1].train.end);
        assert_eq!(pair[1].train.start, pair[0].train.start);
        assert!(pair[1].train.end > pair[0].train.end);
        assert!(pair[0].test.end <= pair[1].test.start);
    }
    for fold in &folds {
        assert!(fold.train.end + config.gap_hours <= fold.test.start);
    }
}

#[test]
fn test_short_history_never_trains_with_required_lags() {
    let records = raw_records(midnight(2025, 1, 1), 24 * 200);
    let mut engine = ForecastEngine::from_records(&records, DuplicatePolicy::Reject, small_regressor()).unwrap();

    let rows = FeatureDeriver::default().derive(engine.series(), None);
    assert!(rows.values().all(|r| r.lag1.is_none()));

    let result = engine.train(&SplitConfig::new(3, 24 * 14, 24));
    assert!(matches!(result, Err(ForecastError::NoFoldsCompleted { attempted: 3 })));
    assert!(!engine.is_trained());
}

#[test]
fn test_two_years_of_history_trains() {
    let records = raw_records(midnight(2023, 1, 1), 24 * 365 * 2);
    let mut engine = ForecastEngine::from_records(&records, DuplicatePolicy::Reject, small_regressor()).unwrap();

    let config = SplitConfig::new(5, 24 * 365, 24).with_lag_policy(LagPolicy::PassThrough);
    let scores = engine.train(&config).unwrap().to_vec();

    assert!(!scores.is_empty());
    assert!(scores.iter().all(|s| s.is_finite() && *s >= 0.0));
    assert!(engine.is_trained());
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_csv_to_forecast() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "date,hour,hourly_demand").unwrap();
    for record in raw_records(midnight(2025, 6, 1), 24 * 12) {
        writeln!(file, "{},{},{}", record.date, record.hour, record.demand).unwrap();
    }
    file.flush().unwrap();

    let records = DataLoader::default().load_records(file.path()).unwrap();
    assert_eq!(records.len(), 24 * 12);

    let mut engine = ForecastEngine::from_records(&records, DuplicatePolicy::Reject, small_regressor())
        .unwrap()
        .with_deriver(FeatureDeriver::new([1, 2, 7]));
    assert!(matches!(
        engine.predict_range(midnight(2025, 6, 13), midnight(2025, 6, 14)),
        Err(ForecastError::ModelNotTrained)
    ));

    engine.train(&SplitConfig::new(2, 48, 0)).unwrap();

    let start = midnight(2025, 6, 13);
    let end = start + Duration::hours(47);
    let forecast = engine.predict_range(start, end).unwrap();
    assert_eq!(forecast.len(), 48);
    assert_eq!(forecast.rows()[0].timestamp, start);
    assert_eq!(forecast.rows()[47].timestamp, end);
    assert!(forecast.iter().all(|r| r.predicted_demand.is_finite() && r.month == 6 && r.year == 2025));

    assert!(matches!(
        engine.predict_range(end, start),
        Err(ForecastError::InvalidRange { .. })
    ));
}

#[test]
fn test_bootstrap_trains_then_loads() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("demand.csv");
    let mut csv = String::from("date,hour,hourly_demand\n");
    for record in raw_records(midnight(2025, 2, 1), 24 * 10) {
        csv.push_str(&format!("{},{},{}\n", record.date, record.hour, record.demand));
    }
    std::fs::write(&data_path, csv).unwrap();

    let config = ForecastConfig {
        dataset_path: data_path,
        model_path: dir.path().join("model.json"),
        lag_offsets_days: [1, 2, 3],
        split: SplitConfig::new(2, 48, 0),
        regressor: small_regressor().config().clone(),
        ..Default::default()
    };

    let first = ForecastEngine::bootstrap(&config).unwrap();
    assert!(first.is_trained());
    assert!(config.model_path.is_file());

    let second = ForecastEngine::bootstrap(&config).unwrap();
    assert_eq!(second.model(), first.model());
    assert_eq!(second.scores(), first.scores());

    let start = midnight(2025, 2, 11);
    assert_eq!(
        first.predict_range(start, start + Duration::hours(5)).unwrap(),
        second.predict_range(start, start + Duration::hours(5)).unwrap()
    );
}
