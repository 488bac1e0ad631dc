//! Safe-ish conversions between rust and sql types.

use super::*;

pub fn i32_to_u32(i: i32) -> Result<u32, String> {
    u32::try_from(i).map_err(|_| format!("i32 value {i} is negative and cannot be converted to u32"))
}

/// Only 1 marks a flag as set, matching the `subset = 1` test in the batch query.
pub fn i32_to_flag(i: i32) -> bool {
    i == 1
}

pub fn i64_to_u64(i: i64) -> Result<u64, String> {
    u64::try_from(i).map_err(|_| format!("i64 value {i} is negative and cannot be converted to u64"))
}

/// Limits larger than `i64::MAX` are as good as unlimited.
pub fn usize_to_i64_limit(i: usize) -> i64 {
    i64::try_from(i).unwrap_or(i64::MAX)
}

/// The numeric encoding of a label, rejecting `Unset`.
pub fn label_to_score(entry: &LabelEntry) -> Result<f64, String> {
    entry
        .label
        .score()
        .ok_or_else(|| format!("record {} has no label to store", entry.record_id))
}

pub fn into_store_error(msg: String) -> StoreError {
    StoreError::Query(msg)
}
