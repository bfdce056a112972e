//! Summary statistics over a set of values.

/// Nearest-rank percentile over ascending-sorted values.
///
/// Index is `ceil(p * n) - 1`, clamped to `[0, n - 1]`. Returns `None` for
/// an empty slice.
pub fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (p * n as f64).ceil() as isize - 1;
    let idx = rank.clamp(0, n as isize - 1) as usize;
    Some(sorted[idx])
}

/// Count, extremes, mean and tail percentiles of a value set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Summary {
    /// Summarize values in any order. Sorts in place; `None` when empty.
    pub fn from_values(values: &mut [f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let sum: f64 = values.iter().sum();
        Some(Self {
            count,
            min: values[0],
            max: values[count - 1],
            mean: sum / count as f64,
            p95: nearest_rank(values, 0.95)?,
            p99: nearest_rank(values, 0.99)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_rank_small_sets() {
        let values = [100.0, 200.0, 300.0];
        assert_eq!(nearest_rank(&values, 0.95), Some(300.0));
        assert_eq!(nearest_rank(&values, 0.99), Some(300.0));
        assert_eq!(nearest_rank(&values, 0.5), Some(200.0));
        assert_eq!(nearest_rank(&values, 0.0), Some(100.0));
        assert_eq!(nearest_rank(&[], 0.5), None);
    }

    #[test]
    fn nearest_rank_hundred_values() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(nearest_rank(&values, 0.95), Some(95.0));
        assert_eq!(nearest_rank(&values, 0.99), Some(99.0));
        assert_eq!(nearest_rank(&values, 1.0), Some(100.0));
    }

    #[test]
    fn summary_of_unsorted_values() {
        let mut values = vec![300.0, 100.0, 200.0];
        let summary = Summary::from_values(&mut values).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 100.0);
        assert_eq!(summary.max, 300.0);
        assert!((summary.mean - 200.0).abs() < f64::EPSILON);
        assert_eq!(summary.p95, 300.0);
        assert_eq!(summary.p99, 300.0);
    }

    #[test]
    fn summary_singleton() {
        let mut values = vec![42.0];
        let summary = Summary::from_values(&mut values).unwrap();
        assert_eq!(summary.mean, 42.0);
        assert_eq!(summary.p95, 42.0);
        assert_eq!(summary.p99, 42.0);
    }

    #[test]
    fn summary_empty() {
        assert!(Summary::from_values(&mut []).is_none());
    }
}
