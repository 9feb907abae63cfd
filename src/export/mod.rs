//! Model persistence module
//!
//! Trained models are written as checksummed artifacts in either:
//! - Native binary format (bincode, compact)
//! - JSON format (portable, human-readable)

mod serializer;

pub use serializer::{ModelFormat, ModelMetadata, ModelStore};
