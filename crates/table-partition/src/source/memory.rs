//! In-memory boundary source.

use std::path::Path;

use async_trait::async_trait;
use serde_yaml::Value;
use tracing::debug;

use super::{BoundarySource, TableRef};
use crate::core::key::{KeySchema, KeyTuple};
use crate::error::{PartitionError, Result};
use crate::partition::boundary::boundary_positions;

/// Key rows of a single table held in memory, sorted by key.
///
/// The sort is stable, so rows with equal keys keep their input order.
/// The `table` argument of the trait methods is not consulted.
#[derive(Debug, Clone)]
pub struct MemorySource {
    schema: KeySchema,
    rows: Vec<KeyTuple>,
}

impl MemorySource {
    pub fn new(schema: KeySchema, mut rows: Vec<KeyTuple>) -> Result<Self> {
        for row in &rows {
            if row.schema() != &schema {
                return Err(PartitionError::mismatch(
                    schema.to_string(),
                    row.schema().to_string(),
                ));
            }
        }
        rows.sort_by(|a, b| a.values().cmp(b.values()));
        Ok(Self { schema, rows })
    }

    /// Parse key rows from YAML.
    ///
    /// The document is a list of rows; each row is a list of scalars in key
    /// order, or a bare scalar for single-column keys:
    ///
    /// ```yaml
    /// - [east, 1]
    /// - [east, 2]
    /// - [west, 1]
    /// ```
    pub fn from_yaml(schema: KeySchema, yaml: &str) -> Result<Self> {
        let doc: Vec<Value> = serde_yaml::from_str(yaml)?;
        let rows = doc
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let texts = match row {
                    Value::Sequence(items) => items
                        .iter()
                        .map(scalar_text)
                        .collect::<Option<Vec<_>>>(),
                    scalar => scalar_text(scalar).map(|t| vec![t]),
                }
                .ok_or_else(|| {
                    PartitionError::Config(format!(
                        "key row {} must be a scalar or a list of scalars",
                        i
                    ))
                })?;
                schema.parse_tuple(&texts)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Loaded {} key rows", rows.len());
        Self::new(schema, rows)
    }

    /// Load key rows from a YAML file.
    pub fn load<P: AsRef<Path>>(schema: KeySchema, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(schema, &content)
    }

    /// Rows in key order.
    pub fn rows(&self) -> &[KeyTuple] {
        &self.rows
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl BoundarySource for MemorySource {
    async fn row_count(&self, _table: &TableRef) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }

    async fn fetch_boundaries(
        &self,
        _table: &TableRef,
        schema: &KeySchema,
        n: usize,
    ) -> Result<Vec<KeyTuple>> {
        if schema != &self.schema {
            return Err(PartitionError::mismatch(
                self.schema.to_string(),
                schema.to_string(),
            ));
        }
        let positions = boundary_positions(self.rows.len() as u64, n)?;
        Ok(positions
            .into_iter()
            .map(|p| self.rows[p as usize].clone())
            .collect())
    }

    fn snapshot(&self, _table: &TableRef) -> Option<Vec<KeyTuple>> {
        Some(self.rows.clone())
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}
