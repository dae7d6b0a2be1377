//! Partition count estimation from a memory probe.
//!
//! A fixed number of rows is materialized in-process, the resident memory
//! growth is measured and extrapolated to the whole table:
//!
//! ```text
//! rows_per_partition = floor(budget / bytes_per_row)
//! N = ceil(total_rows / rows_per_partition), at least 1
//! ```
//!
//! The result is advisory; an explicit partition count always wins.

use async_trait::async_trait;
use serde::Serialize;
use sysinfo::System;
use tracing::{debug, info};

use crate::error::{PartitionError, Result};

/// Default number of rows materialized by the probe.
pub const DEFAULT_PROBE_ROWS: usize = 10_000;

/// Rows read by a probe, each column in textual form.
#[derive(Debug, Default)]
pub struct MaterializedRows {
    pub rows: Vec<Vec<Option<String>>>,
}

impl MaterializedRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lower bound on heap usage, used when the allocator reuses memory and
    /// the process footprint does not move.
    pub fn heap_bytes(&self) -> u64 {
        let slot = std::mem::size_of::<Option<String>>() as u64;
        let row = std::mem::size_of::<Vec<Option<String>>>() as u64;
        self.rows
            .iter()
            .map(|r| {
                row + r
                    .iter()
                    .map(|c| slot + c.as_ref().map_or(0, |s| s.capacity() as u64))
                    .sum::<u64>()
            })
            .sum()
    }
}

/// Reads up to `limit` representative rows of the table into memory.
#[async_trait]
pub trait RowProbe: Send + Sync {
    async fn materialize(&self, limit: usize) -> Result<MaterializedRows>;
}

/// Reports the current process footprint.
pub trait MemorySampler: Send + Sync {
    /// Resident memory in bytes.
    fn resident_bytes(&self) -> Result<u64>;
}

/// Process resident memory as reported by the operating system.
#[derive(Debug, Default)]
pub struct ProcessMemory;

impl MemorySampler for ProcessMemory {
    fn resident_bytes(&self) -> Result<u64> {
        let pid = sysinfo::get_current_pid().map_err(|e| {
            PartitionError::Io(std::io::Error::other(format!(
                "cannot determine current process id: {}",
                e
            )))
        })?;
        let mut sys = System::new();
        sys.refresh_process(pid);
        sys.process(pid).map(|p| p.memory()).ok_or_else(|| {
            PartitionError::Io(std::io::Error::other(
                "process memory is not available on this platform",
            ))
        })
    }
}

/// Measured footprint of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemorySample {
    /// Rows actually materialized (may be fewer than requested).
    pub probe_rows: usize,
    pub probe_bytes: u64,
}

impl MemorySample {
    pub fn bytes_per_row(&self) -> f64 {
        if self.probe_rows == 0 {
            return 0.0;
        }
        self.probe_bytes as f64 / self.probe_rows as f64
    }
}

/// Recommended partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub partition_count: usize,
    pub total_rows: u64,
    pub bytes_per_row: f64,
    pub rows_per_partition: u64,
    pub budget_bytes: u64,
}

/// Memory-budget driven partition count estimator.
#[derive(Debug, Clone, Copy)]
pub struct Estimator {
    probe_rows: usize,
    budget_bytes: u64,
}

impl Estimator {
    pub fn new(probe_rows: usize, budget_mb: u64) -> Self {
        Self {
            probe_rows,
            budget_bytes: budget_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// Materialize the probe and measure its footprint.
    pub async fn sample(
        &self,
        probe: &dyn RowProbe,
        sampler: &dyn MemorySampler,
    ) -> Result<MemorySample> {
        let before = sampler.resident_bytes()?;
        let rows = probe.materialize(self.probe_rows).await?;
        let after = sampler.resident_bytes()?;

        let measured = after.saturating_sub(before);
        let probe_bytes = measured.max(rows.heap_bytes());
        debug!(
            "Probe of {} rows: resident delta {} bytes, heap estimate {} bytes",
            rows.len(),
            measured,
            rows.heap_bytes()
        );

        Ok(MemorySample {
            probe_rows: rows.len(),
            probe_bytes,
        })
    }

    /// Recommend N for `total_rows` from a measured sample.
    pub fn recommend(&self, sample: &MemorySample, total_rows: u64) -> Result<Estimate> {
        if sample.probe_bytes > self.budget_bytes {
            return Err(PartitionError::ProbeExceedsBudget {
                probe_rows: sample.probe_rows,
                probe_bytes: sample.probe_bytes,
                budget_bytes: self.budget_bytes,
            });
        }

        let bytes_per_row = sample.bytes_per_row();
        let rows_per_partition = if bytes_per_row > 0.0 {
            ((self.budget_bytes as f64 / bytes_per_row).floor() as u64).max(1)
        } else {
            total_rows.max(1)
        };
        let partition_count = total_rows.div_ceil(rows_per_partition).max(1);
        let partition_count = usize::try_from(partition_count).map_err(|_| {
            PartitionError::Config(format!(
                "estimated partition count {} is too large",
                partition_count
            ))
        })?;

        Ok(Estimate {
            partition_count,
            total_rows,
            bytes_per_row,
            rows_per_partition,
            budget_bytes: self.budget_bytes,
        })
    }

    /// Sample and recommend in one step.
    pub async fn estimate(
        &self,
        probe: &dyn RowProbe,
        sampler: &dyn MemorySampler,
        total_rows: u64,
    ) -> Result<Estimate> {
        let sample = self.sample(probe, sampler).await?;
        let estimate = self.recommend(&sample, total_rows)?;
        info!(
            "Estimated {} partitions for {} rows ({:.1} bytes/row, {} rows/partition, budget {} MB)",
            estimate.partition_count,
            total_rows,
            estimate.bytes_per_row,
            estimate.rows_per_partition,
            self.budget_bytes / (1024 * 1024)
        );
        Ok(estimate)
    }
}
