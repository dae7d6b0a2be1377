//! Rendering of filter expressions into SQL text.
//!
//! A [`Dialect`] turns an [`Expr`] tree into a `WHERE`-clause fragment for
//! one database engine and declares which key types it can compare reliably.
//! That capability set is checked when key columns are declared, so a plan
//! never contains a comparison its renderer cannot express.
//!
//! - [`PostgresDialect`]: `"quoted"` identifiers, `'text'` literals
//! - [`MssqlDialect`]: `[bracketed]` identifiers, `N'text'` literals

mod mssql;
mod postgres;

pub use mssql::MssqlDialect;
pub use postgres::PostgresDialect;

use crate::core::expr::Expr;
use crate::core::key::{KeyType, KeyValue};
use crate::error::{PartitionError, Result};

/// Key types every built-in dialect renders as ordered comparisons.
///
/// Dates and timestamps are left out until their literal rendering is
/// consistent across engines.
pub const DEFAULT_KEY_TYPES: &[KeyType] = &[KeyType::Integer, KeyType::String, KeyType::Decimal];

/// SQL syntax strategy for rendering partition filters.
pub trait Dialect: Send + Sync {
    /// Dialect identifier (e.g., "postgres", "mssql").
    fn name(&self) -> &str;

    /// Quote an identifier (column, table or schema name).
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Render a schema-qualified table name.
    fn qualify(&self, schema: &str, table: &str) -> Result<String>;

    /// Render a string literal.
    fn string_literal(&self, value: &str) -> String;

    /// Key types this dialect can compare and render.
    fn supported_key_types(&self) -> &[KeyType] {
        DEFAULT_KEY_TYPES
    }

    /// Render a key value as a SQL literal.
    fn literal(&self, value: &KeyValue) -> Result<String> {
        if !self.supported_key_types().contains(&value.key_type()) {
            return Err(PartitionError::unsupported(
                format!("<{} literal>", self.name()),
                value.key_type().name(),
            ));
        }
        Ok(match value {
            KeyValue::Int(v) => v.to_string(),
            KeyValue::Decimal(v) => v.to_string(),
            other => self.string_literal(&other.to_string()),
        })
    }

    /// Render a filter expression.
    ///
    /// `OR` groups inside `AND` (and vice versa) are parenthesized, as is any
    /// raw filter combined with other terms.
    fn render(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::True => Ok("1 = 1".to_string()),
            Expr::False => Ok("1 = 0".to_string()),
            Expr::Compare { column, op, value } => Ok(format!(
                "{} {} {}",
                self.quote_ident(column)?,
                op.symbol(),
                self.literal(value)?
            )),
            Expr::And(parts) => {
                let rendered = parts
                    .iter()
                    .map(|p| match p {
                        Expr::Or(_) | Expr::Raw(_) => Ok(format!("({})", self.render(p)?)),
                        _ => self.render(p),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(rendered.join(" AND "))
            }
            Expr::Or(parts) => {
                let rendered = parts
                    .iter()
                    .map(|p| match p {
                        Expr::And(_) | Expr::Raw(_) => Ok(format!("({})", self.render(p)?)),
                        _ => self.render(p),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(rendered.join(" OR "))
            }
            Expr::Raw(text) => Ok(text.clone()),
        }
    }
}

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Mssql(MssqlDialect),
}

impl DialectImpl {
    /// Look up a dialect by its configuration name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectImpl::Postgres(PostgresDialect::new())),
            "mssql" | "sqlserver" => Ok(DialectImpl::Mssql(MssqlDialect::new())),
            other => Err(PartitionError::Config(format!(
                "unknown database type '{}' (expected 'postgres' or 'mssql')",
                other
            ))),
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.name(),
            DialectImpl::Mssql(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.quote_ident(name),
            DialectImpl::Mssql(d) => d.quote_ident(name),
        }
    }

    fn qualify(&self, schema: &str, table: &str) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.qualify(schema, table),
            DialectImpl::Mssql(d) => d.qualify(schema, table),
        }
    }

    fn string_literal(&self, value: &str) -> String {
        match self {
            DialectImpl::Postgres(d) => d.string_literal(value),
            DialectImpl::Mssql(d) => d.string_literal(value),
        }
    }

    fn supported_key_types(&self) -> &[KeyType] {
        match self {
            DialectImpl::Postgres(d) => d.supported_key_types(),
            DialectImpl::Mssql(d) => d.supported_key_types(),
        }
    }
}

/// Intersection of the capability sets of several dialects.
///
/// Source and target filters are rendered by different dialects, so a key
/// column must be supported by both.
pub fn common_key_types(dialects: &[&dyn Dialect]) -> Vec<KeyType> {
    KeyType::ALL
        .iter()
        .copied()
        .filter(|t| dialects.iter().all(|d| d.supported_key_types().contains(t)))
        .collect()
}
