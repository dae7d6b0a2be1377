//! # table-partition
//!
//! Split a table into N key-range partitions for independent, parallel
//! source/target validation.
//!
//! The library provides:
//!
//! - **Boundary selection** by dense row rank over the primary key order
//! - **Composite keys** with lexicographic range predicates
//! - **Dialect rendering** of partition filters for PostgreSQL and SQL Server
//! - **Partition count estimation** from a memory-budget probe
//! - **Partition configs** written one YAML file per partition, and a runner
//!   that fans them out (including Kubernetes indexed Jobs)
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_partition::{Config, Partitioner, PgSource};
//!
//! #[tokio::main]
//! async fn main() -> table_partition::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let partitioner = Partitioner::new(config)?;
//!     let source = PgSource::new(partitioner.sample_database(), 2).await?;
//!     let mut result = partitioner.generate(&source, 8).await?;
//!     partitioner.write(&mut result, None)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod partition;
pub mod runner;
pub mod source;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, PartitionSettings};
pub use crate::core::{Expr, KeyColumn, KeySchema, KeyTuple, KeyType, KeyValue, RangePredicate};
pub use dialect::{Dialect, DialectImpl, MssqlDialect, PostgresDialect};
pub use error::{PartitionError, Result};
pub use orchestrator::{health_check, GenerateResult, HealthCheckResult, Partitioner};
pub use output::PartitionConfig;
pub use partition::{Estimate, Estimator, Partition, PartitionPlan, ProcessMemory};
pub use runner::{
    job_completion_index, ConfigRunner, CountValidationEngine, RunReport, RunnerArgs,
    ValidationEngine,
};
pub use source::{BoundarySource, MemorySource, PgSource, TableRef};
