//! Data loading utilities

use crate::error::{ForecastError, Result};
use crate::timeseries::RawRecord;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Column names of the demand dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSchema {
    pub date_column: String,
    pub hour_column: String,
    pub demand_column: String,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            hour_column: "hour".to_string(),
            demand_column: "hourly_demand".to_string(),
        }
    }
}

/// Loads raw demand rows from tabular files
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    schema: DatasetSchema,
}

impl DataLoader {
    pub fn new(schema: DatasetSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Read a CSV file into a data frame
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ForecastError::Data(format!("cannot open {}: {}", path.display(), e)))?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| ForecastError::Data(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Read a CSV file straight into raw records
    pub fn load_records(&self, path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
        let start = Instant::now();
        let path = path.as_ref();
        let df = self.load_csv(path)?;
        let records = self.records_from_frame(&df)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            records = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded demand dataset"
        );
        Ok(records)
    }

    /// Convert a data frame into raw records.
    ///
    /// Hour labels may arrive as integers ("01" infers as 1); they are read
    /// back as text and left for the normalizer to decode. Rows with a null
    /// field are skipped.
    pub fn records_from_frame(&self, df: &DataFrame) -> Result<Vec<RawRecord>> {
        let dates = self.column(df, &self.schema.date_column)?.cast(&DataType::String)?;
        let hours = self.column(df, &self.schema.hour_column)?.cast(&DataType::String)?;
        let demand = self.column(df, &self.schema.demand_column)?.cast(&DataType::Float64)?;

        let mut records = Vec::with_capacity(df.height());
        let mut skipped = 0usize;

        for ((date, hour), value) in dates.str()?.into_iter().zip(hours.str()?.into_iter()).zip(demand.f64()?.into_iter()) {
            match (date, hour, value) {
                (Some(date), Some(hour), Some(value)) => records.push(RawRecord::new(date.trim(), hour.trim(), value)),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, "Skipped rows with missing date, hour or demand");
        }

        Ok(records)
    }

    fn column<'a>(&self, df: &'a DataFrame, name: &str) -> Result<&'a Series> {
        df.column(name)
            .map_err(|_| ForecastError::Data(format!("dataset has no '{}' column", name)))
    }
}
