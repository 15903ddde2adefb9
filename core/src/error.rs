use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Calibration error in table '{table}' at '{key}': {reason}")]
    Calibration {
        table:  &'static str,
        key:    String,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenError {
    pub fn calibration(table: &'static str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Calibration {
            table,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type GenResult<T> = Result<T, GenError>;
