//! Partition config files.
//!
//! A plan is written as one YAML file per partition, `0000.yaml`,
//! `0001.yaml`, ... under `<output_dir>/<schema>.<table>/`, so a config
//! directory can be fanned out one file per worker (see [`crate::runner`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::key::KeyValue;
use crate::core::range::RangePredicate;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::partition::planner::PartitionPlan;
use crate::source::TableRef;

/// File name of the config for partition `index`.
pub fn config_file_name(index: usize) -> String {
    format!("{:04}.yaml", index)
}

/// One side of a partition: where to read and what to filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFilter {
    /// Database type the filter was rendered for.
    pub r#type: String,
    pub schema: String,
    pub table: String,
    /// Rendered `WHERE` clause (without the keyword).
    pub filter: String,
}

impl TableFilter {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema, &self.table)
    }
}

/// Shape of the key range a partition owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    /// Whole table.
    All,
    Lt,
    Ge,
    Between,
}

/// Key range of a partition. Bounds list key values in key-column order;
/// `lower` is inclusive and `upper` exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRange {
    pub kind: RangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<Vec<KeyValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<Vec<KeyValue>>,
}

impl From<&RangePredicate> for KeyRange {
    fn from(range: &RangePredicate) -> Self {
        let kind = match range {
            RangePredicate::None => RangeKind::All,
            RangePredicate::Lt(_) => RangeKind::Lt,
            RangePredicate::Ge(_) => RangeKind::Ge,
            RangePredicate::Between { .. } => RangeKind::Between,
        };
        KeyRange {
            kind,
            lower: range.lower().map(|k| k.values().to_vec()),
            upper: range.upper().map(|k| k.values().to_vec()),
        }
    }
}

/// Contents of one partition config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Hash of the configuration that generated this file.
    pub config_hash: String,
    /// 0-based partition index.
    pub partition_index: usize,
    pub partition_count: usize,
    pub key_columns: Vec<String>,
    pub range: KeyRange,
    pub source: TableFilter,
    pub target: TableFilter,
}

impl PartitionConfig {
    /// Load a partition config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Render every partition of `plan` into a config.
pub fn render_partition_configs(
    plan: &PartitionPlan,
    source_dialect: &dyn Dialect,
    target_dialect: &dyn Dialect,
    config_hash: &str,
) -> Result<Vec<PartitionConfig>> {
    let count = plan.partition_count();
    plan.partitions
        .iter()
        .map(|p| {
            Ok(PartitionConfig {
                config_hash: config_hash.to_string(),
                partition_index: p.index,
                partition_count: count,
                key_columns: plan.key_columns.clone(),
                range: KeyRange::from(&p.range),
                source: TableFilter {
                    r#type: source_dialect.name().to_string(),
                    schema: plan.source_table.schema.clone(),
                    table: plan.source_table.name.clone(),
                    filter: p.render_source(source_dialect)?,
                },
                target: TableFilter {
                    r#type: target_dialect.name().to_string(),
                    schema: plan.target_table.schema.clone(),
                    table: plan.target_table.name.clone(),
                    filter: p.render_target(target_dialect)?,
                },
            })
        })
        .collect()
}

/// Write one YAML file per partition config and return the directory used.
pub fn write_partition_configs(
    configs: &[PartitionConfig],
    table: &TableRef,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dir = output_dir.join(table.to_string());
    std::fs::create_dir_all(&dir)?;

    for config in configs {
        let path = dir.join(config_file_name(config.partition_index));
        std::fs::write(&path, serde_yaml::to_string(config)?)?;
        debug!("Wrote {}", path.display());
    }

    info!(
        "Wrote {} partition configs to {}",
        configs.len(),
        dir.display()
    );
    Ok(dir)
}
