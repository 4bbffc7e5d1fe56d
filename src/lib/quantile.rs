//! Linear-interpolation quantile estimation.

/// Compute the `q` quantile of `values` by linear interpolation between closest ranks.
///
/// This is the default method of `numpy.quantile` (type 7 in Hyndman & Fan): with the
/// values sorted, the quantile sits at fractional index `q * (n - 1)`.
///
/// Returns `None` for an empty slice. `q` is clamped to `[0, 1]`; NaN values sort last.
///
/// # Examples
///
/// ```
/// use watchdog_lib::quantile::quantile;
///
/// assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
/// assert_eq!(quantile(&[10.0, 0.0], 0.25), Some(2.5));
/// assert_eq!(quantile(&[], 0.05), None);
/// ```
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let h = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}
