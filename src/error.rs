//! Error types for the retrieval tuner
//!
//! This module provides structured error definitions using thiserror. The
//! optimization path (optimize, apply, monitor) surfaces these errors to the
//! caller; the telemetry path (record, recommend) logs them and degrades.

use crate::config::ConfigError;
use crate::types::{ParameterField, RetrievalStrategy};
use thiserror::Error;

/// Main error type for retrieval tuner operations
#[derive(Error, Debug)]
pub enum TunerError {
    /// Durable store or cache operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The analysis window contained no records
    #[error("No performance data in the last {window_hours} hours")]
    NoData { window_hours: u32 },

    /// A time window too wide to represent as timestamps
    #[error("Window of {window_hours} hours is out of range")]
    WindowOutOfRange { window_hours: u64 },

    /// Not enough records to run an optimization or impact check
    #[error("Insufficient data for {strategy}: found {found} records, need {required}")]
    InsufficientData {
        strategy: RetrievalStrategy,
        found: usize,
        required: usize,
    },

    /// Every search strategy came back empty
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// A parameter value outside its bound range
    #[error("Invalid value {value} for {field}: must be within [{min}, {max}]")]
    InvalidParameter {
        field: ParameterField,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Invalid operation (e.g., applying a result that switches strategy)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for retrieval tuner operations
pub type Result<T> = std::result::Result<T, TunerError>;

/// Convert anyhow::Error to TunerError
impl From<anyhow::Error> for TunerError {
    fn from(err: anyhow::Error) -> Self {
        TunerError::Other(err.to_string())
    }
}

impl From<libsql::Error> for TunerError {
    fn from(err: libsql::Error) -> Self {
        TunerError::Database(err.to_string())
    }
}
