//! SQL Server filter dialect.

use super::Dialect;
use crate::core::identifier::{qualify_mssql, quote_mssql};
use crate::error::Result;

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Create a new MSSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mssql(name)
    }

    fn qualify(&self, schema: &str, table: &str) -> Result<String> {
        qualify_mssql(schema, table)
    }

    // Unicode literal so nvarchar keys compare without implicit conversion.
    fn string_literal(&self, value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }
}
