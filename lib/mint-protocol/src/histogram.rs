//! Minimum/maximum estimation for bucketed histograms.
//!
//! Explicit-bucket histograms only carry per-bucket counts, the total sum, and the total count, so the true minimum and
//! maximum are unknown. Bucket boundaries are the only ground truth we have: the estimates below use the edges of the
//! outermost non-empty buckets, and fall back to the mean when data lands in one of the two unbounded buckets.
//!
//! Given boundaries `b_1 < b_2 < ... < b_n`, bucket `0` covers `(-inf, b_1]`, bucket `i` covers `(b_i, b_{i+1}]`, and
//! bucket `n` covers `(b_n, +inf)`.

/// Estimates the minimum value recorded in a histogram.
pub fn estimate_min(boundaries: &[f64], bucket_counts: &[u64], sum: f64, count: u64) -> f64 {
    if boundaries.is_empty() {
        return single_bucket_estimate(sum, count);
    }

    match bucket_counts.iter().position(|count| *count > 0) {
        // Data in the bucket that is unbounded below: the lowest boundary is an upper bound for the minimum, but the
        // mean may be lower still.
        Some(0) => boundaries[0].min(sum / count as f64),
        Some(idx) => boundaries[(idx - 1).min(boundaries.len() - 1)],
        None => sum,
    }
}

/// Estimates the maximum value recorded in a histogram.
pub fn estimate_max(boundaries: &[f64], bucket_counts: &[u64], sum: f64, count: u64) -> f64 {
    if boundaries.is_empty() {
        return single_bucket_estimate(sum, count);
    }

    let last_boundary = boundaries.len() - 1;
    match bucket_counts.iter().rposition(|count| *count > 0) {
        // Data in the bucket that is unbounded above.
        Some(idx) if idx > last_boundary => boundaries[last_boundary].max(sum / count as f64),
        Some(idx) => boundaries[idx],
        None => sum,
    }
}

/// Estimates both the minimum and maximum value recorded in a histogram.
///
/// See [`estimate_min`] and [`estimate_max`].
pub fn estimate_min_max(boundaries: &[f64], bucket_counts: &[u64], sum: f64, count: u64) -> (f64, f64) {
    (
        estimate_min(boundaries, bucket_counts, sum, count),
        estimate_max(boundaries, bucket_counts, sum, count),
    )
}

fn single_bucket_estimate(sum: f64, count: u64) -> f64 {
    // With a single sample (or none at all), the sum is already the value itself (or zero).
    if count > 1 {
        sum / count as f64
    } else {
        sum
    }
}
