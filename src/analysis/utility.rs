/// Computes the arithmetic mean of a slice of values. Returns `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Linearly interpolated quantile of an ascending slice, `q` in `[0, 1]`.
/// Returns `None` for empty input.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Rounds to one decimal place, ties to even.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Percentage of values strictly above `threshold`. Returns `None` for empty input.
pub fn percent_above(values: &[f64], threshold: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let over = values.iter().filter(|v| **v > threshold).count();
    Some(over as f64 / values.len() as f64 * 100.0)
}

/// Count, centre and spread of a set of headways.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

impl Distribution {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted(values);
        Some(Self {
            count: sorted.len(),
            median: quantile_sorted(&sorted, 0.5)?,
            mean: mean(&sorted)?,
            p25: quantile_sorted(&sorted, 0.25)?,
            p75: quantile_sorted(&sorted, 0.75)?,
            p90: quantile_sorted(&sorted, 0.90)?,
        })
    }

    pub fn rounded(self) -> Self {
        Self {
            count: self.count,
            median: round1(self.median),
            mean: round1(self.mean),
            p25: round1(self.p25),
            p75: round1(self.p75),
            p90: round1(self.p90),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(percent_above(&[], 5.0), None);
        assert_eq!(Distribution::from_values(&[]), None);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_linear_quantiles() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&values, 0.25), Some(2.0));
        assert_eq!(quantile(&values, 0.75), Some(4.0));
        assert!((quantile(&values, 0.9).unwrap() - 4.6).abs() < 1e-9);
        assert_eq!(quantile(&[7.0], 0.9), Some(7.0));
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(6.44), 6.4);
        assert_eq!(round1(6.46), 6.5);
        assert_eq!(round1(0.25), 0.2);
    }

    #[test]
    fn test_percent_above_is_strict() {
        assert_eq!(percent_above(&[5.0, 10.0, 15.0, 20.0], 10.0), Some(50.0));
    }

    #[test]
    fn test_distribution() {
        let d = Distribution::from_values(&[4.0, 6.0, 8.0, 10.0]).unwrap();
        assert_eq!(d.count, 4);
        assert_eq!(d.median, 7.0);
        assert_eq!(d.mean, 7.0);
        assert_eq!(d.p25, 5.5);
        assert_eq!(d.p75, 8.5);
        assert!((d.p90 - 9.4).abs() < 1e-9);
    }
}
