//! Turns ranked boundaries into per-partition key ranges.

use crate::core::range::RangePredicate;
use crate::error::{PartitionError, Result};

use super::boundary::Boundary;

/// One range per boundary, in rank order.
///
/// Partition `i` starts at boundary `i` and ends before boundary `i + 1`. The
/// first partition has no lower bound and the last has no upper bound, so
/// keys below the first boundary row (inserted after sampling) still land
/// somewhere.
pub fn build_ranges(boundaries: &[Boundary]) -> Result<Vec<RangePredicate>> {
    if boundaries.is_empty() {
        return Err(PartitionError::InvalidPartitionCount(0));
    }
    for (i, b) in boundaries.iter().enumerate() {
        if b.rank != i + 1 {
            return Err(PartitionError::Validation(format!(
                "boundary ranks must run 1..{} in order, found rank {} at position {}",
                boundaries.len(),
                b.rank,
                i
            )));
        }
    }

    let n = boundaries.len();
    if n == 1 {
        return Ok(vec![RangePredicate::None]);
    }

    Ok((0..n)
        .map(|i| match i {
            0 => RangePredicate::Lt(boundaries[1].key.clone()),
            i if i == n - 1 => RangePredicate::Ge(boundaries[i].key.clone()),
            i => RangePredicate::Between {
                lower: boundaries[i].key.clone(),
                upper: boundaries[i + 1].key.clone(),
            },
        })
        .collect())
}
