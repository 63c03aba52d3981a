use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

/// Failures raised by the store, predictor and analytics layers.
#[derive(Debug, Error)]
pub enum AppError {
    /// The dataset file could not be read or parsed.
    #[error("failed to load dataset {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    /// An uploaded file lacks required columns.
    #[error("CSV file missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// A record or request body is missing a usable numeric feature.
    #[error("invalid feature input: {0}")]
    Feature(String),

    #[error("Student not found")]
    NotFound(String),

    /// A mean was requested over a column with no values.
    #[error("no values available for {0}")]
    EmptyDataset(String),

    /// The upload request itself is unusable (extension, field, encoding).
    #[error("{0}")]
    InvalidUpload(String),

    /// The model artifact could not be loaded.
    #[error("failed to load model {}: {reason}", path.display())]
    Model { path: PathBuf, reason: String },

    #[error("failed to write {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}

impl AppError {
    pub fn data_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AppError::DataLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn model(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AppError::Model {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AppError::Persist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Default HTTP status: client input is 400, lookups are 404, the rest 500.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Schema { .. } | AppError::Feature(_) | AppError::InvalidUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DataLoad { .. }
            | AppError::EmptyDataset(_)
            | AppError::Model { .. }
            | AppError::Persist { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
