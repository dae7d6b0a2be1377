//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::partition::estimator::DEFAULT_PROBE_ROWS;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database the source table lives in.
    pub source: DatabaseConfig,

    /// Database the target table lives in.
    pub target: DatabaseConfig,

    /// What to partition and how.
    pub partition: PartitionSettings,
}

/// Connection settings for one side.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database type: "postgres" or "mssql" (default: postgres).
    #[serde(default = "default_db_type")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432 for postgres, 1433 for mssql).
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema name (default: public for postgres, dbo for mssql).
    #[serde(default)]
    pub schema: Option<String>,

    /// SSL mode: disable or prefer (default: disable).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn is_mssql(&self) -> bool {
        matches!(self.r#type.to_lowercase().as_str(), "mssql" | "sqlserver")
    }

    /// Configured port, or the database type's default.
    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or(if self.is_mssql() { 1433 } else { 5432 })
    }

    /// Configured schema, or the database type's default.
    pub fn schema(&self) -> &str {
        match &self.schema {
            Some(s) => s,
            None if self.is_mssql() => "dbo",
            None => "public",
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema())
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// One declared primary-key column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyColumn {
    pub name: String,

    /// Declared database type (e.g. "bigint", "varchar(50)").
    pub r#type: String,
}

/// Partitioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Table name used on both sides unless overridden.
    pub table: String,

    /// Source table name (default: `table`).
    #[serde(default)]
    pub source_table: Option<String>,

    /// Target table name (default: `table`).
    #[serde(default)]
    pub target_table: Option<String>,

    /// Primary-key columns in key order.
    pub primary_keys: Vec<PrimaryKeyColumn>,

    /// Base filter AND-ed into every partition filter.
    #[serde(default)]
    pub filter: Option<String>,

    /// Explicit partition count; estimated from the memory budget when absent.
    #[serde(default)]
    pub partition_count: Option<usize>,

    /// Memory budget per partition in MB.
    #[serde(default)]
    pub memory_budget_mb: Option<u64>,

    /// Rows materialized by the estimator probe (default: 10000).
    #[serde(default = "default_probe_rows")]
    pub probe_rows: usize,

    /// Directory partition configs are written to (default: partitions).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Check in memory that every row lands in exactly one partition.
    #[serde(default)]
    pub check_coverage: bool,
}

impl PartitionSettings {
    pub fn source_table(&self) -> &str {
        self.source_table.as_deref().unwrap_or(&self.table)
    }

    pub fn target_table(&self) -> &str {
        self.target_table.as_deref().unwrap_or(&self.table)
    }
}

fn default_db_type() -> String {
    "postgres".to_string()
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_probe_rows() -> usize {
    DEFAULT_PROBE_ROWS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("partitions")
}
