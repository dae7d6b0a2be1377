//! Boundary sources: where ordered key rows come from.
//!
//! - [`MemorySource`]: rows held in memory (tests, YAML key files)
//! - [`PgSource`]: a live PostgreSQL table

mod memory;
mod postgres;

pub use memory::MemorySource;
pub use postgres::{PgProbe, PgSource};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::key::{KeySchema, KeyTuple};
use crate::error::Result;

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Supplies the boundary rows of a table in primary-key order.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    /// Number of rows in the table.
    async fn row_count(&self, table: &TableRef) -> Result<u64>;

    /// Key tuples of the N boundary rows, in key order.
    ///
    /// Rows are ranked by position in key order with ties broken by a stable
    /// secondary order, so exactly `min(n, row_count)` tuples come back.
    async fn fetch_boundaries(
        &self,
        table: &TableRef,
        schema: &KeySchema,
        n: usize,
    ) -> Result<Vec<KeyTuple>>;

    /// All key rows, when the source can cheaply provide them.
    fn snapshot(&self, _table: &TableRef) -> Option<Vec<KeyTuple>> {
        None
    }

    /// Source type identifier (e.g., "memory", "postgres").
    fn db_type(&self) -> &str;
}
