//! Partition generation: boundary selection, range building, assembly and
//! partition count estimation.

pub mod assembler;
pub mod boundary;
pub mod builder;
pub mod estimator;
pub mod planner;

pub use assembler::{assemble, base_filter, check_coverage, Partition};
pub use boundary::{boundary_positions, select_boundaries, Boundary};
pub use builder::build_ranges;
pub use estimator::{
    Estimate, Estimator, MaterializedRows, MemorySample, MemorySampler, ProcessMemory, RowProbe,
    DEFAULT_PROBE_ROWS,
};
pub use planner::{generate_partitions, PartitionPlan, PlanRequest};
