//! Popularity ranking for merged results.
//!
//! ```text
//! popularity = rating * review_count
//! ```
//!
//! Sorted descending. The sort is stable, so equal scores keep their
//! merged order (primary before fallback).

use std::cmp::Ordering;

use crate::types::ProductRecord;

/// Sort `records` by descending popularity and keep the first `limit`.
pub fn rank(mut records: Vec<ProductRecord>, limit: usize) -> Vec<ProductRecord> {
    records.sort_by(|a, b| {
        b.popularity()
            .partial_cmp(&a.popularity())
            .unwrap_or(Ordering::Equal)
    });
    records.truncate(limit);
    records
}
