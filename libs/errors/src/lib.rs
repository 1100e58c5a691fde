//! Unified error handling for spoccer
//!
//! Every crate in the workspace reports failures through [`SpocError`]. The
//! variants are grouped into families that decide how a reconciliation run
//! treats them:
//!
//! - [`ColumnError`]: schema validation, always fail-fast
//! - [`FileRegistryError`] and [`TagStateError`]: scoped to a single match,
//!   handled by the caller-supplied error policy
//! - [`ConsistencyError`]: the dataset is not reconcilable, always fatal

use thiserror::Error;

// ============================================================================
// Column validation errors
// ============================================================================

/// Violations of a declared column invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("Non-unique value in {table}@{column}: {value}")]
    NonUnique {
        table: String,
        column: String,
        value: String,
    },

    #[error("Empty field in {table}@{column} at row {row}")]
    EmptyField {
        table: String,
        column: String,
        row: usize,
    },

    #[error("Invalid pattern in {table}@{column}: '{value}' (expected {expected})")]
    InvalidPattern {
        table: String,
        column: String,
        value: String,
        expected: String,
    },

    #[error("Invalid tag pattern in {table}@{column}: '{value}'")]
    InvalidTagPattern {
        table: String,
        column: String,
        value: String,
    },

    #[error("Missing column in {table}: {column}")]
    MissingColumn { table: String, column: String },
}

impl ColumnError {
    /// Table the offending column belongs to
    pub fn table(&self) -> &str {
        match self {
            Self::NonUnique { table, .. }
            | Self::EmptyField { table, .. }
            | Self::InvalidPattern { table, .. }
            | Self::InvalidTagPattern { table, .. }
            | Self::MissingColumn { table, .. } => table,
        }
    }

    /// Name of the offending column
    pub fn column(&self) -> &str {
        match self {
            Self::NonUnique { column, .. }
            | Self::EmptyField { column, .. }
            | Self::InvalidPattern { column, .. }
            | Self::InvalidTagPattern { column, .. }
            | Self::MissingColumn { column, .. } => column,
        }
    }

    /// Attach the table and column a context-free error was raised for
    pub fn located(self, table: &str, column: &str) -> Self {
        match self {
            Self::NonUnique { value, .. } => Self::NonUnique {
                table: table.to_string(),
                column: column.to_string(),
                value,
            },
            Self::EmptyField { row, .. } => Self::EmptyField {
                table: table.to_string(),
                column: column.to_string(),
                row,
            },
            Self::InvalidPattern {
                value, expected, ..
            } => Self::InvalidPattern {
                table: table.to_string(),
                column: column.to_string(),
                value,
                expected,
            },
            Self::InvalidTagPattern { value, .. } => Self::InvalidTagPattern {
                table: table.to_string(),
                column: column.to_string(),
                value,
            },
            Self::MissingColumn { .. } => Self::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            },
        }
    }
}

// ============================================================================
// File registry (H2GO export) errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileRegistryError {
    #[error("No file registry record matches pattern '{pattern}'")]
    FileNotFound { pattern: String },

    #[error("Pattern '{pattern}' matches {count} file registry records")]
    MultipleMatches { pattern: String, count: usize },

    #[error("Content mismatch in {file}: {column} expected '{expected}', found '{found}'")]
    ContentMismatch {
        file: String,
        column: String,
        expected: String,
        found: String,
    },
}

// ============================================================================
// Tag state errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagStateError {
    #[error("Tag is muted: {tag}")]
    Muted { tag: String },

    #[error("Tag not known by the historian for location {location}: {tag}")]
    NotInKnownSet { location: String, tag: String },
}

// ============================================================================
// Consistency errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("Inconsistent sync levels for {id} in column {column}: {levels}")]
    Disagreement {
        id: String,
        column: String,
        levels: String,
    },

    #[error("Cannot move sync level from {current} to {requested}")]
    IllegalTransition { current: String, requested: String },

    #[error("Tags {first} and {second} share output file {filename}")]
    FilenameCollision {
        filename: String,
        first: String,
        second: String,
    },
}

// ============================================================================
// SpocError - Main error type
// ============================================================================

/// Main error type for all spoccer crates
#[derive(Debug, Error)]
pub enum SpocError {
    #[error(transparent)]
    Column(#[from] ColumnError),

    #[error(transparent)]
    FileRegistry(#[from] FileRegistryError),

    #[error(transparent)]
    TagState(#[from] TagStateError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Historian query failed for {location}: {reason}")]
    Historian { location: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parse error: {file}: {error}")]
    ParseError { file: String, error: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias using SpocError
pub type SpocResult<T> = Result<T, SpocError>;

impl SpocError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn historian(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Historian {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(file: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::ParseError {
            file: file.into(),
            error: error.to_string(),
        }
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::SpocError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SpocError::Configuration(format!($fmt, $($arg)*))
    };
}

// ============================================================================
// Error trait - classification shared by all crates
// ============================================================================

/// Error category enum - used for classification and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Schema,
    FileRegistry,
    TagState,
    Consistency,
    Historian,
    Configuration,
    NotFound,
    Io,
}

/// Capability trait implemented by spoccer error types
pub trait SpocErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and reports)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the error only invalidates the match it was raised for
    fn is_match_scoped(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::FileRegistry | ErrorCategory::TagState | ErrorCategory::Historian
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Consistency | ErrorCategory::Io => Level::ERROR,
            ErrorCategory::FileRegistry | ErrorCategory::TagState | ErrorCategory::Historian => {
                Level::WARN
            },
            _ => Level::ERROR,
        }
    }
}

impl SpocErrorTrait for SpocError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Column(e) => match e {
                ColumnError::NonUnique { .. } => "NON_UNIQUE",
                ColumnError::EmptyField { .. } => "EMPTY_FIELD",
                ColumnError::InvalidPattern { .. } => "INVALID_PATTERN",
                ColumnError::InvalidTagPattern { .. } => "INVALID_TAG_PATTERN",
                ColumnError::MissingColumn { .. } => "MISSING_COLUMN",
            },
            Self::FileRegistry(e) => match e {
                FileRegistryError::FileNotFound { .. } => "FILE_NOT_FOUND",
                FileRegistryError::MultipleMatches { .. } => "MULTIPLE_MATCHES",
                FileRegistryError::ContentMismatch { .. } => "CONTENT_MISMATCH",
            },
            Self::TagState(e) => match e {
                TagStateError::Muted { .. } => "TAG_MUTED",
                TagStateError::NotInKnownSet { .. } => "TAG_UNKNOWN",
            },
            Self::Consistency(e) => match e {
                ConsistencyError::Disagreement { .. } => "SYNC_LEVEL_DISAGREEMENT",
                ConsistencyError::IllegalTransition { .. } => "SYNC_LEVEL_SKIP",
                ConsistencyError::FilenameCollision { .. } => "FILENAME_COLLISION",
            },
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Historian { .. } => "HISTORIAN_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Csv(_) => "CSV_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Column(_) => ErrorCategory::Schema,
            Self::FileRegistry(_) => ErrorCategory::FileRegistry,
            Self::TagState(_) => ErrorCategory::TagState,
            Self::Consistency(_) => ErrorCategory::Consistency,
            Self::Historian { .. } => ErrorCategory::Historian,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::ParseError { .. } | Self::Io(_) | Self::Csv(_) => ErrorCategory::Io,
        }
    }
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_match_scoped_families() {
        let muted: SpocError = TagStateError::Muted { tag: "x".into() }.into();
        assert!(muted.is_match_scoped());

        let missing: SpocError = FileRegistryError::FileNotFound {
            pattern: "1_2".into(),
        }
        .into();
        assert!(missing.is_match_scoped());

        let skip: SpocError = ConsistencyError::IllegalTransition {
            current: "LIVE".into(),
            requested: "DEBIET".into(),
        }
        .into();
        assert!(!skip.is_match_scoped());
        assert_eq!(skip.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_error_codes() {
        let err: SpocError = ColumnError::NonUnique {
            table: "HL".into(),
            column: "CODE".into(),
            value: "HL000001".into(),
        }
        .into();
        assert_eq!(err.error_code(), "NON_UNIQUE");
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert!(err.to_string().contains("HL@CODE"));
    }

    #[test]
    fn test_column_error_located() {
        let err = ColumnError::InvalidPattern {
            table: String::new(),
            column: String::new(),
            value: "XX1".into(),
            expected: "HL######".into(),
        }
        .located("HL", "CODE");
        assert_eq!(err.table(), "HL");
        assert_eq!(err.column(), "CODE");
    }

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("missing {}", "srcdir");
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("missing srcdir"));
    }
}
