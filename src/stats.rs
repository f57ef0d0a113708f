//! Small descriptive statistics over `f64` slices.
//!
//! Every function returns `None` for an empty input so that callers can tell
//! "no data" apart from a real zero.

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Smallest value
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Largest value
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Percentage of values strictly below `threshold`
pub fn pct_below(values: &[f64], threshold: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let below = values.iter().filter(|v| **v < threshold).count();
    Some(below as f64 / values.len() as f64 * 100.0)
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is in [0, 1]. Matches the common "linear" definition:
/// position `q * (n - 1)` in the sorted sample.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), None);
        assert_eq!(min(&[]), None);
        assert_eq!(max(&[]), None);
        assert_eq!(pct_below(&[], 1.0), None);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_basic_stats() {
        let v = [3.0, 1.0, 2.0, 6.0];
        assert_relative_eq!(mean(&v).unwrap(), 3.0);
        assert_eq!(min(&v), Some(1.0));
        assert_eq!(max(&v), Some(6.0));
        assert_relative_eq!(pct_below(&v, 3.0).unwrap(), 50.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let v = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_relative_eq!(quantile(&v, 0.0).unwrap(), 10.0);
        assert_relative_eq!(quantile(&v, 1.0).unwrap(), 50.0);
        assert_relative_eq!(quantile(&v, 0.5).unwrap(), 30.0);
        // 0.1 * 4 = 0.4 -> 10 + 0.4 * 10
        assert_relative_eq!(quantile(&v, 0.1).unwrap(), 14.0);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_eq!(quantile(&[7.5], 0.1), Some(7.5));
    }
}
