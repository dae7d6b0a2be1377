//! Identifier validation and quoting for generated filters.
//!
//! Identifiers (schema, table and key column names) cannot be bound as query
//! parameters, so they are validated and quoted per dialect before being
//! spliced into SQL text.

use crate::error::{PartitionError, Result};

/// Longest name accepted for schemas, tables and key columns (SQL Server's
/// limit; PostgreSQL truncates at 63 bytes).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Check that `name` can be quoted safely into a partition filter.
pub fn validate_identifier(name: &str) -> Result<()> {
    let problem = if name.is_empty() {
        "is empty"
    } else if name.contains('\0') {
        "contains a null byte"
    } else if name.len() > MAX_IDENTIFIER_LENGTH {
        "is longer than 128 bytes"
    } else {
        return Ok(());
    };
    Err(PartitionError::Config(format!(
        "identifier {:?} {}",
        name, problem
    )))
}

/// Quote a PostgreSQL identifier.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQL Server identifier using brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Qualify a SQL Server table name with schema.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

/// Validate a caller-supplied base filter.
///
/// The filter is passed to the database verbatim, so only a single boolean
/// expression is allowed: no statement separators and no comment markers.
pub fn validate_base_filter(filter: &str) -> Result<()> {
    if filter.trim().is_empty() {
        return Err(PartitionError::Config("filter cannot be empty".into()));
    }

    if filter.contains(';') {
        return Err(PartitionError::Config(format!(
            "filter must be a single expression, found ';' in {:?}",
            filter
        )));
    }

    if filter.contains("--") || filter.contains("/*") || filter.contains("*/") {
        return Err(PartitionError::Config(format!(
            "filter must not contain SQL comments: {:?}",
            filter
        )));
    }

    Ok(())
}
