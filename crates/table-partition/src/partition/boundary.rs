//! Boundary selection by dense row rank.
//!
//! Rows are numbered by position in primary-key order (`rn`, 1-based, one
//! number per row even when key values tie). Row `rn` belongs to partition
//! `ceil(rn * N / C)` and is a boundary when it is the first row of that
//! partition. For `N < C` this is the same as `(rn * N) mod C` falling in
//! `(0, N]`; the ceil form also covers `N = C`.
//!
//! The first row of 0-based partition `k` sits at 0-based position
//! `floor(k * C / N)`, so partition sizes differ by at most one row.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::warn;

use crate::core::key::KeyTuple;
use crate::error::{PartitionError, Result};

/// First row of a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boundary {
    /// 1-based partition rank.
    pub rank: usize,
    pub key: KeyTuple,
}

fn check_request(row_count: u64, n: usize) -> Result<()> {
    if n == 0 {
        return Err(PartitionError::InvalidPartitionCount(n));
    }
    if row_count < n as u64 {
        return Err(PartitionError::InsufficientRows {
            requested: n,
            row_count,
        });
    }
    Ok(())
}

/// Whether the row at 1-based position `rn` starts a partition.
pub fn is_boundary_row(rn: u64, n: usize, row_count: u64) -> bool {
    if rn == 0 || rn > row_count || n == 0 {
        return false;
    }
    let (rn, n, c) = (rn as u128, n as u128, row_count as u128);
    let partition = |r: u128| (r * n).div_ceil(c);
    partition(rn) != partition(rn - 1)
}

/// 0-based row positions of the N boundary rows, ascending.
pub fn boundary_positions(row_count: u64, n: usize) -> Result<Vec<u64>> {
    check_request(row_count, n)?;
    let (c, n128) = (row_count as u128, n as u128);
    Ok((0..n as u128).map(|k| (k * c / n128) as u64).collect())
}

/// Pick the N boundaries from rows already sorted by key.
///
/// The rows are ordered by [`KeyTuple::compare`], so the picked keys must be
/// non-decreasing under it.
pub fn select_boundaries(sorted_rows: &[KeyTuple], n: usize) -> Result<Vec<Boundary>> {
    let positions = boundary_positions(sorted_rows.len() as u64, n)?;
    let keys: Vec<KeyTuple> = positions
        .into_iter()
        .map(|p| sorted_rows[p as usize].clone())
        .collect();

    for pair in keys.windows(2) {
        if pair[0].compare(&pair[1])? == Ordering::Greater {
            return Err(PartitionError::Validation(format!(
                "boundary keys out of order: {} after {}",
                pair[1], pair[0]
            )));
        }
    }
    boundaries_from_keys(keys)
}

/// Assign ranks to boundary keys fetched in row order.
///
/// The order is the source's own: a database sorts by column collation,
/// which need not match [`KeyTuple::compare`], and it also evaluates the
/// rendered filters, so the keys are not re-sorted or re-checked here.
/// Equal adjacent keys (duplicate key values straddling a boundary) are
/// kept: the earlier partition will match no rows and the later one takes
/// them all. That is logged rather than corrected.
pub fn boundaries_from_keys(keys: Vec<KeyTuple>) -> Result<Vec<Boundary>> {
    for (i, pair) in keys.windows(2).enumerate() {
        if pair[0] == pair[1] {
            warn!(
                "Boundaries {} and {} share key {}; partition {} will be empty",
                i + 1,
                i + 2,
                pair[1],
                i
            );
        }
    }

    Ok(keys
        .into_iter()
        .enumerate()
        .map(|(i, key)| Boundary { rank: i + 1, key })
        .collect())
}
