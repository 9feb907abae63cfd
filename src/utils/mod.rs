//! Utility functions and types

pub mod data_loader;

pub use data_loader::{DataLoader, DatasetSchema};
