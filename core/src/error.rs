use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record table is missing required column '{name}'")]
    MissingColumn { name: String },

    #[error("Record table column lengths disagree: '{name}' has {actual} rows, expected {expected}")]
    ColumnLengthMismatch { name: String, expected: usize, actual: usize },

    #[error("Weight vector has {weights} entries but the design matrix has {rows} rows")]
    WeightLengthMismatch { weights: usize, rows: usize },

    #[error("Target vector has {targets} entries but the design matrix has {cols} columns")]
    TargetLengthMismatch { targets: usize, cols: usize },

    #[error("Initial weight at index {index} must be strictly positive, got {value}")]
    NonPositiveWeight { index: usize, value: f64 },

    #[error("Unit mapping covers {mapping} tax units but the record table has {records}")]
    MappingLengthMismatch { mapping: usize, records: usize },

    #[error("Invalid noise configuration: {reason}")]
    InvalidNoise { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CalibResult<T> = Result<T, CalibError>;
