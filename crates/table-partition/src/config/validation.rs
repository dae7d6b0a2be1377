//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::core::identifier::validate_identifier;
use crate::dialect::DialectImpl;
use crate::error::{PartitionError, Result};

fn validate_database(side: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(PartitionError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(PartitionError::Config(format!(
            "{}.database is required",
            side
        )));
    }
    if db.user.is_empty() {
        return Err(PartitionError::Config(format!("{}.user is required", side)));
    }
    DialectImpl::from_name(&db.r#type)
        .map_err(|e| PartitionError::Config(format!("{}.type: {}", side, e)))?;
    validate_identifier(db.schema())
        .map_err(|e| PartitionError::Config(format!("{}.schema: {}", side, e)))?;

    match db.ssl_mode.to_lowercase().as_str() {
        "disable" | "prefer" => {}
        other => {
            return Err(PartitionError::Config(format!(
                "{}.ssl_mode '{}' is not supported (valid options: disable, prefer)",
                side, other
            )))
        }
    }
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    let partition = &config.partition;
    for (field, name) in [
        ("partition.table", partition.table.as_str()),
        ("partition.source_table", partition.source_table()),
        ("partition.target_table", partition.target_table()),
    ] {
        validate_identifier(name)
            .map_err(|e| PartitionError::Config(format!("{}: {}", field, e)))?;
    }

    if partition.primary_keys.is_empty() {
        return Err(PartitionError::Config(
            "partition.primary_keys must list at least one column".into(),
        ));
    }

    if let Some(0) = partition.partition_count {
        return Err(PartitionError::Config(
            "partition.partition_count must be at least 1".into(),
        ));
    }
    if partition.partition_count.is_none() && partition.memory_budget_mb.is_none() {
        return Err(PartitionError::Config(
            "partition.memory_budget_mb is required when partition.partition_count is not set"
                .into(),
        ));
    }
    if let Some(0) = partition.memory_budget_mb {
        return Err(PartitionError::Config(
            "partition.memory_budget_mb must be at least 1".into(),
        ));
    }
    if partition.probe_rows == 0 {
        return Err(PartitionError::Config(
            "partition.probe_rows must be at least 1".into(),
        ));
    }

    // Key columns and types, and the base filter
    config.key_schema()?;
    config.base_filter()?;

    Ok(())
}
