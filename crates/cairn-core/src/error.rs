use thiserror::Error;

/// Core error type for cairn operations.
#[derive(Error, Debug)]
pub enum CairnError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate migration identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Migration {identifier} failed to apply: {cause}")]
    ApplyFailed {
        identifier: String,
        cause: Box<CairnError>,
    },

    #[error("Migration {identifier} failed to revert: {cause}")]
    RevertFailed {
        identifier: String,
        cause: Box<CairnError>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CairnError {
    /// Wrap an error raised inside a migration's `up` body.
    pub fn apply_failed(identifier: impl Into<String>, cause: CairnError) -> Self {
        CairnError::ApplyFailed {
            identifier: identifier.into(),
            cause: Box::new(cause),
        }
    }

    /// Wrap an error raised inside a migration's `down` body.
    pub fn revert_failed(identifier: impl Into<String>, cause: CairnError) -> Self {
        CairnError::RevertFailed {
            identifier: identifier.into(),
            cause: Box::new(cause),
        }
    }

    /// The identifier of the failing migration, if this error carries one.
    pub fn failed_identifier(&self) -> Option<&str> {
        match self {
            CairnError::ApplyFailed { identifier, .. }
            | CairnError::RevertFailed { identifier, .. } => Some(identifier),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CairnError {
    fn from(e: serde_json::Error) -> Self {
        CairnError::Serialization(e.to_string())
    }
}

/// Result type alias using CairnError.
pub type Result<T> = std::result::Result<T, CairnError>;
