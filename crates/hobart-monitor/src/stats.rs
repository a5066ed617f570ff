//! Two-sample drift tests and simple reductions.

use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::BTreeMap;

/// Result of a two-sample Kolmogorov–Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// Largest gap between the two empirical CDFs.
    pub statistic: f64,
    /// Asymptotic p-value.
    pub p_value: f64,
}

/// Survival function of the Kolmogorov distribution,
/// `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let term = fac * (a2 * f64::from(j * j)).exp();
        sum += term;
        if term.abs() <= 0.001 * previous || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        previous = term.abs();
    }
    // no convergence: λ is tiny and the distributions are indistinguishable
    1.0
}

/// Two-sample KS test over the finite values of `a` and `b`.
///
/// The p-value uses the Kolmogorov limit with the small-sample correction
/// `λ = (√n_e + 0.12 + 0.11/√n_e) · D`, `n_e = n·m / (n + m)`. Either sample
/// being empty gives `None`.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Option<KsResult> {
    let sorted = |values: &[f64]| {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        v.sort_by(f64::total_cmp);
        v
    };
    let (a, b) = (sorted(a), sorted(b));
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut statistic: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        statistic = statistic.max((i as f64 / n - j as f64 / m).abs());
    }
    let en = (n * m / (n + m)).sqrt();
    let p_value = kolmogorov_survival((en + 0.12 + 0.11 / en) * statistic);
    Some(KsResult { statistic, p_value })
}

/// Chi-square goodness-of-fit of current category counts against the
/// reference proportions scaled to the current size.
///
/// A category absent from the reference but present now gives a p-value of
/// 0. A single category overall gives 1. Either sample empty gives `None`.
pub fn chi_square_categorical<S: AsRef<str>>(reference: &[S], current: &[S]) -> Option<f64> {
    if reference.is_empty() || current.is_empty() {
        return None;
    }
    let mut counts: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for r in reference {
        counts.entry(r.as_ref()).or_default().0 += 1.0;
    }
    for c in current {
        counts.entry(c.as_ref()).or_default().1 += 1.0;
    }
    if counts.len() < 2 {
        return Some(1.0);
    }

    let scale = current.len() as f64 / reference.len() as f64;
    let mut statistic = 0.0;
    for (reference_count, observed) in counts.values() {
        let expected = reference_count * scale;
        if expected == 0.0 {
            return Some(0.0);
        }
        statistic += (observed - expected).powi(2) / expected;
    }
    let dof = (counts.len() - 1) as f64;
    Some(ChiSquared::new(dof).map_or(1.0, |dist| dist.sf(statistic)))
}

/// Median with linear interpolation between the middle values.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values.into_iter().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    })
}

/// Share of values outside the closed range `[low, high]`.
pub fn share_outside(values: &[f64], low: f64, high: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let outside = values.iter().filter(|v| !(low..=high).contains(*v)).count();
    Some(outside as f64 / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_ks_identical_samples() {
        let a: Vec<f64> = (0..50).map(f64::from).collect();
        let result = ks_two_sample(&a, &a).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_relative_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_ks_disjoint_samples() {
        let a: Vec<f64> = (0..100).map(f64::from).collect();
        let b: Vec<f64> = (1000..1100).map(f64::from).collect();
        let result = ks_two_sample(&a, &b).unwrap();
        assert_relative_eq!(result.statistic, 1.0);
        assert!(result.p_value < 1e-10);
    }

    #[test]
    fn test_ks_half_shift() {
        let a: Vec<f64> = (0..10).map(f64::from).collect();
        let b: Vec<f64> = (5..15).map(f64::from).collect();
        assert_relative_eq!(ks_two_sample(&a, &b).unwrap().statistic, 0.5);
        assert!(ks_two_sample(&a, &[]).is_none());
    }

    #[rstest]
    #[case(0.5, 0.963_945)]
    #[case(1.0, 0.269_999)]
    #[case(1.36, 0.049_486)]
    fn test_kolmogorov_survival(#[case] lambda: f64, #[case] expected: f64) {
        assert_relative_eq!(kolmogorov_survival(lambda), expected, epsilon = 1e-4);
    }

    #[test]
    fn test_chi_square_same_mix_does_not_drift() {
        let reference = ["A", "A", "B", "B", "C", "C"];
        let current = ["A", "B", "C"];
        assert_relative_eq!(chi_square_categorical(&reference, &current).unwrap(), 1.0);
    }

    #[test]
    fn test_chi_square_new_category_drifts() {
        let reference = ["A", "B"];
        let current = ["A", "Z"];
        assert_eq!(chi_square_categorical(&reference, &current), Some(0.0));
        assert_eq!(chi_square_categorical(&["A"], &["A", "A"]), Some(1.0));
    }

    #[test]
    fn test_chi_square_shifted_mix() {
        let reference: Vec<&str> = std::iter::repeat_n("A", 50).chain(std::iter::repeat_n("B", 50)).collect();
        let current: Vec<&str> = std::iter::repeat_n("A", 90).chain(std::iter::repeat_n("B", 10)).collect();
        // statistic = 2 · 40² / 50 = 64 on one degree of freedom
        assert!(chi_square_categorical(&reference, &current).unwrap() < 1e-10);
    }

    #[test]
    fn test_median_and_range_share() {
        assert_eq!(median([3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median([4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(Vec::new()), None);
        assert_eq!(share_outside(&[-0.003, 0.0, 0.0025, 0.01], -0.0025, 0.0025), Some(0.5));
        assert_eq!(share_outside(&[], 0.0, 1.0), None);
    }
}
