//! Model serialization utilities
//!
//! A trained model is stored inside an envelope carrying magic bytes, a format
//! version, descriptive metadata and an FNV-1a checksum of the payload. The
//! envelope is written with bincode or as JSON; loading detects which.

use crate::error::{ForecastError, Result};
use crate::training::{Regressor, TrainedModel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

const MAGIC: [u8; 4] = *b"EDFM";
const FORMAT_VERSION: u32 = 1;

/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// Binary format using bincode (compact)
    Binary,
    /// JSON format (portable, human-readable)
    #[default]
    Json,
}

/// Descriptive fields stored next to the model payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub regressor: String,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    pub feature_names: Vec<String>,
    pub lag_offsets_days: [i64; 3],
    pub fold_scores: Vec<f64>,
    /// Crate version that wrote the artifact
    pub writer_version: String,
}

impl ModelMetadata {
    fn describe<R: Regressor>(model: &TrainedModel<R>) -> Self {
        Self {
            regressor: model.regressor.name().to_string(),
            trained_at: model.trained_at.to_rfc3339(),
            feature_names: model.feature_names(),
            lag_offsets_days: model.lag_offsets_days,
            fold_scores: model.fold_scores.clone(),
            writer_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Bincode envelopes carry raw payload bytes, JSON envelopes carry the payload text
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<P> {
    magic: [u8; 4],
    format_version: u32,
    metadata: ModelMetadata,
    payload: P,
    checksum: u64,
}

impl<P: AsRef<[u8]>> Envelope<P> {
    fn new(metadata: ModelMetadata, payload: P) -> Self {
        let checksum = compute_checksum(payload.as_ref());
        Self {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            metadata,
            payload,
            checksum,
        }
    }

    fn verify(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(ForecastError::Serialization("not a demand model artifact".to_string()));
        }
        if self.format_version != FORMAT_VERSION {
            return Err(ForecastError::Serialization(format!(
                "unsupported format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        if compute_checksum(self.payload.as_ref()) != self.checksum {
            return Err(ForecastError::Serialization("checksum mismatch, artifact is corrupted".to_string()));
        }
        Ok(())
    }
}

/// Compute checksum using FNV-1a hash
fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn is_json(bytes: &[u8]) -> bool {
    bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{')
}

/// Saves and loads trained models as opaque artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelStore {
    format: ModelFormat,
}

impl ModelStore {
    pub fn new(format: ModelFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }

    /// Encode a model in the store's format
    pub fn save<R: Regressor>(&self, model: &TrainedModel<R>) -> Result<Vec<u8>> {
        let metadata = ModelMetadata::describe(model);
        match self.format {
            ModelFormat::Binary => {
                let payload = bincode::serialize(model)?;
                Ok(bincode::serialize(&Envelope::new(metadata, payload))?)
            }
            ModelFormat::Json => {
                let payload = serde_json::to_string(model)?;
                Ok(serde_json::to_vec_pretty(&Envelope::new(metadata, payload))?)
            }
        }
    }

    /// Decode a model written in either format
    pub fn load<R: Regressor>(&self, bytes: &[u8]) -> Result<TrainedModel<R>> {
        if is_json(bytes) {
            let envelope: Envelope<String> = serde_json::from_slice(bytes)?;
            envelope.verify()?;
            Ok(serde_json::from_str(&envelope.payload)?)
        } else {
            let envelope: Envelope<Vec<u8>> = decode_binary(bytes)?;
            envelope.verify()?;
            Ok(bincode::deserialize(&envelope.payload)?)
        }
    }

    /// Read only the metadata of an artifact
    pub fn metadata(&self, bytes: &[u8]) -> Result<ModelMetadata> {
        if is_json(bytes) {
            let envelope: Envelope<String> = serde_json::from_slice(bytes)?;
            envelope.verify()?;
            Ok(envelope.metadata)
        } else {
            let envelope: Envelope<Vec<u8>> = decode_binary(bytes)?;
            envelope.verify()?;
            Ok(envelope.metadata)
        }
    }

    /// Save to file, creating parent directories
    pub fn save_to_path<R: Regressor>(&self, model: &TrainedModel<R>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.save(model)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), format = ?self.format, bytes = bytes.len(), "Model saved");
        Ok(())
    }

    pub fn load_from_path<R: Regressor>(&self, path: impl AsRef<Path>) -> Result<TrainedModel<R>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let model = self.load(&bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "Model loaded");
        Ok(model)
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }
}

fn decode_binary<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if !bytes.starts_with(&MAGIC) {
        debug!(len = bytes.len(), "Artifact does not start with model magic bytes");
        return Err(ForecastError::Serialization("not a demand model artifact".to_string()));
    }
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::{FeatureDeriver, FEATURES};
    use crate::training::{EvalSet, XGBoostConfig, XGBoostRegressor};
    use ndarray::{Array1, Array2};

    fn trained() -> (TrainedModel, Array2<f64>) {
        let x = Array2::from_shape_fn((60, FEATURES.len()), |(i, j)| {
            if j == 7 && i % 5 == 0 {
                f64::NAN
            } else {
                ((i * (j + 3)) % 17) as f64 * 0.37
            }
        });
        let y: Array1<f64> = (0..60).map(|i| 100.0 + (i % 24) as f64 * 3.3).collect();

        let mut regressor = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 25,
            learning_rate: 0.3,
            early_stopping_rounds: None,
            log_every: 0,
            ..Default::default()
        });
        regressor.fit(&x, &y, &[EvalSet::new(&x, &y)]).unwrap();
        let model = TrainedModel::new(regressor, FEATURES.to_vec(), FeatureDeriver::default(), vec![12.5, 11.25]);
        (model, x)
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let (model, x) = trained();
        let before = model.regressor.predict(&x).unwrap();

        for format in [ModelFormat::Binary, ModelFormat::Json] {
            let store = ModelStore::new(format);
            let bytes = store.save(&model).unwrap();
            let loaded: TrainedModel = store.load(&bytes).unwrap();
            let after = loaded.regressor.predict(&x).unwrap();

            assert_eq!(loaded, model, "{:?}", format);
            for (a, b) in before.iter().zip(after.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_format_detected_on_load() {
        let (model, _) = trained();
        let bytes = ModelStore::new(ModelFormat::Binary).save(&model).unwrap();
        let loaded: TrainedModel = ModelStore::new(ModelFormat::Json).load(&bytes).unwrap();
        assert_eq!(loaded.fold_scores, vec![12.5, 11.25]);
    }

    #[test]
    fn test_metadata() {
        let (model, _) = trained();
        let store = ModelStore::default();
        let metadata = store.metadata(&store.save(&model).unwrap()).unwrap();
        assert_eq!(metadata.regressor, "xgboost");
        assert_eq!(metadata.feature_names.len(), 9);
        assert_eq!(metadata.lag_offsets_days, [364, 728, 1092]);
    }

    #[test]
    fn test_corruption_detected() {
        let (model, _) = trained();

        let mut bytes = ModelStore::new(ModelFormat::Binary).save(&model).unwrap();
        let last = bytes.len() - 20;
        bytes[last] ^= 0xFF;
        let result: Result<TrainedModel> = ModelStore::default().load(&bytes);
        assert!(matches!(result, Err(ForecastError::Serialization(_))));

        let garbage: Result<TrainedModel> = ModelStore::default().load(b"not a model");
        assert!(matches!(garbage, Err(ForecastError::Serialization(_))));
    }

    #[test]
    fn test_save_to_path() {
        let (model, _) = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        let store = ModelStore::default();

        assert!(!store.exists(&path));
        store.save_to_path(&model, &path).unwrap();
        assert!(store.exists(&path));

        let loaded: TrainedModel = store.load_from_path(&path).unwrap();
        assert_eq!(loaded, model);
    }
}
