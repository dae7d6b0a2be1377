//! Row-count validation of a partition against PostgreSQL.

use async_trait::async_trait;
use tracing::debug;

use super::{ValidationEngine, ValidationResult, ValidationStatus};
use crate::config::Config;
use crate::error::{PartitionError, Result};
use crate::output::{PartitionConfig, TableFilter};
use crate::source::PgSource;

/// Compares source and target row counts of each partition.
pub struct CountValidationEngine {
    source: PgSource,
    target: PgSource,
}

impl CountValidationEngine {
    pub fn new(source: PgSource, target: PgSource) -> Self {
        Self { source, target }
    }

    /// Connect to both databases of `config`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let (source, target) = tokio::try_join!(
            PgSource::new(&config.source, 2),
            PgSource::new(&config.target, 2)
        )?;
        Ok(Self::new(source, target))
    }
}

fn require_postgres(side: &str, filter: &TableFilter) -> Result<()> {
    if filter.r#type != "postgres" {
        return Err(PartitionError::Config(format!(
            "{} filter was rendered for '{}'; row counts need a postgres connection",
            side, filter.r#type
        )));
    }
    Ok(())
}

#[async_trait]
impl ValidationEngine for CountValidationEngine {
    async fn validate(&self, config: &PartitionConfig) -> Result<ValidationResult> {
        require_postgres("source", &config.source)?;
        require_postgres("target", &config.target)?;

        let source_table = config.source.table_ref();
        let target_table = config.target.table_ref();
        let (source_rows, target_rows) = tokio::try_join!(
            self.source
                .count_rows(&source_table, Some(&config.source.filter)),
            self.target
                .count_rows(&target_table, Some(&config.target.filter))
        )?;
        debug!(
            "Partition {}: {} has {} rows, {} has {} rows",
            config.partition_index, source_table, source_rows, target_table, target_rows
        );

        Ok(ValidationResult {
            partition_index: config.partition_index,
            source_rows,
            target_rows,
            status: if source_rows == target_rows {
                ValidationStatus::Success
            } else {
                ValidationStatus::Fail
            },
        })
    }
}
