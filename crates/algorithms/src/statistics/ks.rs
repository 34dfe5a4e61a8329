//! Two-sample Kolmogorov-Smirnov test
//!
//! The p-value uses the asymptotic Kolmogorov distribution with Stephens'
//! small-sample correction of the effective sample size.

/// Outcome of a two-sample KS test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    /// Maximum distance between the empirical CDFs
    pub statistic: f64,
    /// Probability of a distance at least this large under the null hypothesis
    pub p_value: f64,
}

impl KsResult {
    /// True when the null hypothesis (same distribution) is not rejected at `alpha`
    pub fn is_similar(&self, alpha: f64) -> bool {
        self.p_value >= alpha
    }
}

/// Two-sample KS test. `None` when either sample is empty.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> Option<KsResult> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable_by(|x, y| x.total_cmp(y));
    b.sort_unstable_by(|x, y| x.total_cmp(y));

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;

    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / na - j as f64 / nb).abs());
    }

    let ne = na * nb / (na + nb);
    let sqrt_ne = ne.sqrt();
    let lambda = (sqrt_ne + 0.12 + 0.11 / sqrt_ne) * d;

    Some(KsResult {
        statistic: d,
        p_value: kolmogorov_survival(lambda),
    })
}

/// `Q(lambda) = 2 * sum_{k>=1} (-1)^(k-1) exp(-2 k^2 lambda^2)`
fn kolmogorov_survival(lambda: f64) -> f64 {
    const EPS_REL: f64 = 1e-10;
    const EPS_ABS: f64 = 1e-16;

    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0_f64;

    for k in 1..=100 {
        let kf = k as f64;
        let term = sign * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= EPS_REL * previous || term.abs() <= EPS_ABS * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // Series did not converge: lambda is tiny, distributions indistinguishable
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::Lcg;

    #[test]
    fn test_identical_samples() {
        let a: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let r = ks_two_sample(&a, &a).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!((r.p_value - 1.0).abs() < 1e-12);
        assert!(r.is_similar(0.05));
    }

    #[test]
    fn test_disjoint_samples() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let r = ks_two_sample(&a, &b).unwrap();
        assert!((r.statistic - 1.0).abs() < 1e-12);
        assert!(r.p_value < 1e-6, "p = {}", r.p_value);
        assert!(!r.is_similar(0.05));
    }

    #[test]
    fn test_statistic_with_ties() {
        let r = ks_two_sample(&[1.0, 2.0, 2.0, 3.0], &[2.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((r.statistic - 0.25).abs() < 1e-12, "D = {}", r.statistic);
    }

    #[test]
    fn test_shifted_normals_rejected() {
        let mut rng = Lcg::new(11);
        let a: Vec<f64> = (0..500).map(|_| rng.next_normal()).collect();
        let b: Vec<f64> = (0..500).map(|_| rng.next_normal() + 1.0).collect();
        let r = ks_two_sample(&a, &b).unwrap();
        assert!(r.p_value < 1e-6, "Shift of one sigma must be detected, p = {}", r.p_value);
    }

    #[test]
    fn test_survival_bounds() {
        assert_eq!(kolmogorov_survival(0.0), 1.0);
        let q = kolmogorov_survival(1.36);
        assert!((q - 0.05).abs() < 0.002, "Q(1.36) should be ~0.05, got {}", q);
        assert!(kolmogorov_survival(5.0) < 1e-15);
        assert!(ks_two_sample(&[], &[1.0]).is_none());
    }
}
