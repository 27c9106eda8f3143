//! Order statistics shared by the aggregator and the load harness.

/// Nearest-rank percentile over an ascending slice.
///
/// Picks index `ceil(p/100 * n) - 1`, clamped to `[0, n-1]`. The rank is computed in
/// integers so that exact products such as `95 * 20 / 100` never round up past the
/// intended element. Returns `None` for an empty slice.
pub fn nearest_rank<T: Copy>(sorted: &[T], percent: u32) -> Option<T> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (percent as usize * n).div_ceil(100);
    let idx = rank.saturating_sub(1).min(n - 1);
    Some(sorted[idx])
}

/// Sort `values` ascending using IEEE total ordering so NaN cannot panic the sort.
pub fn sort_f64(values: &mut [f64]) {
    values.sort_unstable_by(f64::total_cmp);
}
