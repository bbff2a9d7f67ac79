//! Batch partitioning into contiguous, non-overlapping slices of the record set.

/// Split `items` into sequential batches of `batch_size` (the last may be shorter).
///
/// Concatenating the batches in order reproduces `items` exactly. A zero
/// batch size is treated as one.
pub fn partition_batches<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    items
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Number of batches `total` items produce at `batch_size`.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}
