//! Partitioning workflow: from a configuration to written partition configs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, DatabaseConfig};
use crate::core::expr::Expr;
use crate::core::key::KeySchema;
use crate::dialect::DialectImpl;
use crate::error::{PartitionError, Result};
use crate::output::{render_partition_configs, write_partition_configs, PartitionConfig};
use crate::partition::estimator::{Estimate, Estimator, MemorySampler, RowProbe};
use crate::partition::planner::{generate_partitions, PartitionPlan, PlanRequest};
use crate::source::{BoundarySource, PgSource, TableRef};

/// Drives boundary sampling, estimation and config output for one table.
pub struct Partitioner {
    config: Config,
    key_schema: KeySchema,
    base_filter: Option<Expr>,
    source_dialect: DialectImpl,
    target_dialect: DialectImpl,
}

/// Result of a generate run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    pub table: String,
    pub row_count: u64,
    pub partition_count: usize,
    pub config_hash: String,
    /// Directory the partition configs were written to.
    pub output_dir: Option<PathBuf>,
    pub partitions: Vec<PartitionConfig>,
}

impl GenerateResult {
    /// Get result as JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connection status of the source and target databases.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy(&self) -> bool {
        self.source_connected && self.target_connected
    }
}

async fn check_database(db: &DatabaseConfig) -> (bool, u64, Option<String>) {
    let start = Instant::now();
    let outcome = match PgSource::new(db, 1).await {
        Ok(source) => source.ping().await,
        Err(e) => Err(e),
    };
    let latency = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(()) => (true, latency, None),
        Err(e) => (false, latency, Some(e.to_string())),
    }
}

/// Connect to both databases and report latency or the failure.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let (source, target) = tokio::join!(
        check_database(&config.source),
        check_database(&config.target)
    );
    HealthCheckResult {
        source_connected: source.0,
        source_latency_ms: source.1,
        source_error: source.2,
        target_connected: target.0,
        target_latency_ms: target.1,
        target_error: target.2,
    }
}

impl Partitioner {
    /// Create a partitioner for a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        let key_schema = config.key_schema()?;
        let base_filter = config.base_filter()?;
        let source_dialect = config.source_dialect()?;
        let target_dialect = config.target_dialect()?;

        Ok(Self {
            config,
            key_schema,
            base_filter,
            source_dialect,
            target_dialect,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Table boundary rows are read from: the source side when it is a
    /// PostgreSQL table, otherwise the target side.
    pub fn sample_table(&self) -> TableRef {
        if self.config.source.is_mssql() {
            self.config.target_table()
        } else {
            self.config.source_table()
        }
    }

    /// Database settings of the sampled side.
    pub fn sample_database(&self) -> &DatabaseConfig {
        if self.config.source.is_mssql() {
            &self.config.target
        } else {
            &self.config.source
        }
    }

    pub fn plan_request(&self) -> PlanRequest {
        PlanRequest {
            source_table: self.config.source_table(),
            target_table: self.config.target_table(),
            sample_table: self.sample_table(),
            key_schema: self.key_schema.clone(),
            base_filter: self.base_filter.clone(),
            check_coverage: self.config.partition.check_coverage,
        }
    }

    /// Estimate N from a memory probe.
    pub async fn estimate(
        &self,
        source: &dyn BoundarySource,
        probe: &dyn RowProbe,
        sampler: &dyn MemorySampler,
        probe_rows: Option<usize>,
        budget_mb: Option<u64>,
    ) -> Result<Estimate> {
        let budget_mb = budget_mb
            .or(self.config.partition.memory_budget_mb)
            .ok_or_else(|| {
                PartitionError::Config(
                    "a memory budget is required to estimate the partition count".into(),
                )
            })?;
        let probe_rows = probe_rows.unwrap_or(self.config.partition.probe_rows);

        let total_rows = source.row_count(&self.sample_table()).await?;
        Estimator::new(probe_rows, budget_mb)
            .estimate(probe, sampler, total_rows)
            .await
    }

    /// Partition count to use: explicit override, then configuration, then
    /// an estimate from the memory probe.
    pub async fn partition_count(
        &self,
        requested: Option<usize>,
        source: &dyn BoundarySource,
        probe: Option<&dyn RowProbe>,
        sampler: &dyn MemorySampler,
    ) -> Result<usize> {
        if let Some(n) = requested.or(self.config.partition.partition_count) {
            return Ok(n);
        }
        match probe {
            Some(probe) => Ok(self
                .estimate(source, probe, sampler, None, None)
                .await?
                .partition_count),
            None => Err(PartitionError::Config(
                "partition count is not set and this source cannot be probed; pass --partitions"
                    .into(),
            )),
        }
    }

    /// Generate N partitions and render their configs.
    pub async fn generate(&self, source: &dyn BoundarySource, n: usize) -> Result<GenerateResult> {
        let plan = generate_partitions(source, &self.plan_request(), n).await?;
        self.render(&plan)
    }

    fn render(&self, plan: &PartitionPlan) -> Result<GenerateResult> {
        let config_hash = self.config.hash();
        let partitions = render_partition_configs(
            plan,
            &self.source_dialect,
            &self.target_dialect,
            &config_hash,
        )?;

        Ok(GenerateResult {
            table: plan.source_table.to_string(),
            row_count: plan.row_count,
            partition_count: plan.partition_count(),
            config_hash,
            output_dir: None,
            partitions,
        })
    }

    /// Write the rendered configs under `output_dir` (default: configured).
    pub fn write(&self, result: &mut GenerateResult, output_dir: Option<&Path>) -> Result<PathBuf> {
        let base = output_dir.unwrap_or(self.config.partition.output_dir.as_path());
        let table_dir = base.join(self.config.source_table().to_string());
        if table_dir.exists() {
            warn!("Overwriting partition configs in {}", table_dir.display());
        }
        let dir =
            write_partition_configs(&result.partitions, &self.config.source_table(), base)?;
        result.output_dir = Some(dir.clone());
        info!(
            "{} partitions of {} ready in {}",
            result.partition_count,
            result.table,
            dir.display()
        );
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::estimator::MaterializedRows;
    use crate::source::MemorySource;
    use async_trait::async_trait;

    const YAML: &str = r#"
source:
  type: mssql
  host: src
  database: sales
  user: reader
target:
  host: dst
  database: sales
  user: loader
partition:
  table: orders
  primary_keys:
    - { name: id, type: int }
  filter: "status <> 'void'"
  memory_budget_mb: 1
  probe_rows: 100
"#;

    fn partitioner() -> Partitioner {
        Partitioner::new(Config::from_yaml(YAML).unwrap()).unwrap()
    }

    fn source(p: &Partitioner, rows: i64) -> MemorySource {
        let keys: String = (1..=rows).map(|k| format!("- {}\n", k)).collect();
        MemorySource::from_yaml(p.key_schema().clone(), &keys).unwrap()
    }

    struct FlatSampler;

    impl MemorySampler for FlatSampler {
        fn resident_bytes(&self) -> Result<u64> {
            Ok(0)
        }
    }

    /// 100 rows of roughly 10 KB each.
    struct WideProbe;

    #[async_trait]
    impl RowProbe for WideProbe {
        async fn materialize(&self, limit: usize) -> Result<MaterializedRows> {
            Ok(MaterializedRows {
                rows: (0..limit).map(|_| vec![Some("x".repeat(10_000))]).collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_health_check_reports_unconnectable_side() {
        let config = Config::from_yaml(YAML).unwrap();
        let (connected, _, error) = check_database(&config.source).await;
        assert!(!connected);
        assert!(error.unwrap().contains("only postgres"));
    }

    #[test]
    fn test_sample_table_avoids_mssql_side() {
        let p = partitioner();
        assert_eq!(p.sample_table(), TableRef::new("public", "orders"));
        assert_eq!(p.sample_database().host, "dst");
    }

    #[tokio::test]
    async fn test_generate_renders_both_dialects() {
        let p = partitioner();
        let result = p.generate(&source(&p, 10), 3).await.unwrap();

        assert_eq!(result.partition_count, 3);
        assert_eq!(result.table, "dbo.orders");
        assert_eq!(result.config_hash, p.config().hash());
        assert_eq!(
            result.partitions[1].source.filter,
            "(status <> 'void') AND [id] >= 4 AND [id] < 7"
        );
        assert_eq!(
            result.partitions[2].target.filter,
            "(status <> 'void') AND \"id\" >= 7"
        );

        let json = result.to_json().unwrap();
        assert!(json.contains("\"partition_count\": 3"));
    }

    #[tokio::test]
    async fn test_write_uses_table_directory() {
        let p = partitioner();
        let mut result = p.generate(&source(&p, 6), 2).await.unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let dir = p.write(&mut result, Some(tmp.path())).unwrap();
        assert_eq!(dir, tmp.path().join("dbo.orders"));
        assert_eq!(result.output_dir.as_deref(), Some(dir.as_path()));
        assert!(dir.join("0001.yaml").exists());
    }

    #[tokio::test]
    async fn test_partition_count_precedence() {
        let p = partitioner();
        let src = source(&p, 1000);

        // Explicit request wins
        assert_eq!(
            p.partition_count(Some(7), &src, None, &FlatSampler)
                .await
                .unwrap(),
            7
        );

        // Otherwise estimated: ~10 KB/row in a 1 MB budget -> 104 rows each
        let n = p
            .partition_count(None, &src, Some(&WideProbe), &FlatSampler)
            .await
            .unwrap();
        assert!((9..=10).contains(&n), "n = {}", n);

        // No count, no probe
        assert!(p
            .partition_count(None, &src, None, &FlatSampler)
            .await
            .is_err());
    }
}
