//! Error types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing the monthly files
#[derive(Debug)]
pub enum StorageError {
    /// I/O error (file access, directory creation, rename)
    IoError(std::io::Error),

    /// The delimited file could not be read or written
    CsvError(csv::Error),

    /// No header of the file matches a required column
    MissingColumn(&'static str),

    /// A month key that is not `MM-YYYY`
    InvalidMonthKey(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
            StorageError::CsvError(err) => write!(f, "CSV error: {}", err),
            StorageError::MissingColumn(column) => {
                write!(f, "no column matching `{}` in header", column)
            }
            StorageError::InvalidMonthKey(key) => {
                write!(f, "invalid month key `{}` (expected MM-YYYY)", key)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            StorageError::CsvError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        StorageError::CsvError(err)
    }
}
