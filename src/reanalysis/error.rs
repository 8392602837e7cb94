use chrono::NaiveDate;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateSelectionError {
    #[error("Invalid date '{0}'. Format: YYYY-MM-DD")]
    InvalidFormat(String),

    #[error("Invalid date {date}. The last update date is: {last_update}")]
    DateTooRecent {
        date: NaiveDate,
        last_update: NaiveDate,
    },

    #[error("The start date {start} is more recent than the end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("Maximum query of 731 days reached ({days} days requested)")]
    RangeTooLong { days: i64 },
}

#[derive(Debug, Error)]
pub enum ReanalysisError {
    #[error("Failed to open NetCDF file '{0}'")]
    NetcdfOpen(PathBuf, #[source] netcdf::Error),

    #[error("Failed to read variable '{variable}' from '{path}'")]
    NetcdfRead {
        path: PathBuf,
        variable: String,
        #[source]
        source: netcdf::Error,
    },

    #[error("Variable '{variable}' not found in '{path}'")]
    MissingVariable { path: PathBuf, variable: String },

    #[error("No time axis ('time' or 'valid_time') in '{0}'")]
    MissingTimeAxis(PathBuf),

    #[error("Time axis in '{0}' has no units attribute")]
    MissingTimeUnits(PathBuf),

    #[error("Cannot parse time axis units '{0}'")]
    TimeUnits(String),

    #[error("Variable '{variable}' in '{path}' has {values} values, not divisible into {steps} time steps")]
    ShapeMismatch {
        path: PathBuf,
        variable: String,
        values: usize,
        steps: usize,
    },

    #[error("Failed processing DataFrame")]
    DataFrame(#[from] PolarsError),

    #[error("I/O error writing parquet cache file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet cache file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to scan parquet cache file '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
