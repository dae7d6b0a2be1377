//! Error types for partition generation.

use thiserror::Error;

/// Main error type for partition generation and the collaborators around it.
#[derive(Error, Debug)]
pub enum PartitionError {
    /// Declared key column type cannot be rendered as a comparison.
    #[error("Unsupported key type '{data_type}' for column {column}")]
    UnsupportedKeyType { column: String, data_type: String },

    /// Key tuples or values built from different column sequences.
    #[error("Key schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// Table has fewer rows than requested partitions.
    #[error("Cannot split {row_count} rows into {requested} partitions")]
    InsufficientRows { requested: usize, row_count: u64 },

    /// Memory probe alone is larger than the configured budget.
    #[error(
        "Probe of {probe_rows} rows used {probe_bytes} bytes, exceeding the budget of {budget_bytes} bytes"
    )]
    ProbeExceedsBudget {
        probe_rows: usize,
        probe_bytes: u64,
        budget_bytes: u64,
    },

    /// Partition count of zero.
    #[error("Partition count must be at least 1, got {0}")]
    InvalidPartitionCount(usize),

    /// A row matched zero or several partition ranges.
    #[error("Row {row} matched {matches} partitions (expected exactly 1)")]
    CoverageViolation { row: String, matches: usize },

    /// Expression cannot be evaluated in memory.
    #[error("Cannot evaluate filter: {0}")]
    Evaluate(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database query error
    #[error("Database error: {0}")]
    Source(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// One or more partition validations failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PartitionError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        PartitionError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an UnsupportedKeyType error
    pub fn unsupported(column: impl Into<String>, data_type: impl Into<String>) -> Self {
        PartitionError::UnsupportedKeyType {
            column: column.into(),
            data_type: data_type.into(),
        }
    }

    /// Create a SchemaMismatch error
    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        PartitionError::SchemaMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Process exit code for the CLI.
    ///
    /// Input problems the operator can fix (bad keys, too many partitions,
    /// budget too small) get distinct codes from I/O failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            PartitionError::Config(_) | PartitionError::Yaml(_) => 2,
            PartitionError::UnsupportedKeyType { .. }
            | PartitionError::SchemaMismatch { .. }
            | PartitionError::InvalidPartitionCount(_) => 3,
            PartitionError::InsufficientRows { .. } => 4,
            PartitionError::ProbeExceedsBudget { .. } => 5,
            PartitionError::Source(_) | PartitionError::Pool { .. } => 6,
            PartitionError::Validation(_) | PartitionError::CoverageViolation { .. } => 7,
            PartitionError::Evaluate(_) | PartitionError::Io(_) | PartitionError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for partition operations.
pub type Result<T> = std::result::Result<T, PartitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_rows_names_parameters() {
        let err = PartitionError::InsufficientRows {
            requested: 8,
            row_count: 3,
        };
        assert_eq!(err.to_string(), "Cannot split 3 rows into 8 partitions");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err = PartitionError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: missing.yaml"));
    }

    #[test]
    fn test_unsupported_key_type_message() {
        let err = PartitionError::unsupported("created_at", "timestamp");
        assert_eq!(
            err.to_string(),
            "Unsupported key type 'timestamp' for column created_at"
        );
    }
}
