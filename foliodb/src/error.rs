use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioDbError {
    #[error("Cannot create directory {path}: {source}")]
    DirectoryCreation {
        path: String,
        source: std::io::Error,
    },

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Record not found: {table}/{id}")]
    RecordNotFound { table: String, id: String },

    #[error("Record id mismatch: file named '{expected}' contains id '{actual}'")]
    RecordIdMismatch { expected: String, actual: String },

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{field}' accepts [{expected}], got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid criterion: {0}")]
    InvalidCriterion(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Corrupt data in {path}: {reason}")]
    CorruptData { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FolioDbError>;
