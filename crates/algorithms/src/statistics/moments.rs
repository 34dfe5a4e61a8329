//! Central moments and order statistics of sample vectors
//!
//! All functions take plain `f64` slices of valid values; callers filter
//! no-data beforehand.

/// First four central moments of a sample (population normalisation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Sample size
    pub n: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Second central moment (population variance)
    pub m2: f64,
    /// Third central moment
    pub m3: f64,
    /// Fourth central moment
    pub m4: f64,
}

impl Moments {
    /// Compute moments with a two-pass algorithm. `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n == 0 {
            return None;
        }
        let nf = n as f64;
        let mean = values.iter().sum::<f64>() / nf;

        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }

        Some(Self {
            n,
            mean,
            m2: m2 / nf,
            m3: m3 / nf,
            m4: m4 / nf,
        })
    }

    /// Population standard deviation
    pub fn std(&self) -> f64 {
        self.m2.sqrt()
    }

    /// Bias-corrected sample skewness G1. Needs n >= 3 and non-zero variance.
    pub fn skewness(&self) -> Option<f64> {
        if self.n < 3 || self.m2 <= 0.0 {
            return None;
        }
        let n = self.n as f64;
        let g1 = self.m3 / self.m2.powf(1.5);
        Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
    }

    /// Bias-corrected sample excess kurtosis G2. Needs n >= 4 and non-zero variance.
    pub fn excess_kurtosis(&self) -> Option<f64> {
        if self.n < 4 || self.m2 <= 0.0 {
            return None;
        }
        let n = self.n as f64;
        let g2 = self.m4 / (self.m2 * self.m2) - 3.0;
        Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
    }
}

/// Bias-corrected sample skewness G1 of `values`
pub fn sample_skewness(values: &[f64]) -> Option<f64> {
    Moments::of(values)?.skewness()
}

/// Bias-corrected sample excess kurtosis G2 of `values`
pub fn sample_excess_kurtosis(values: &[f64]) -> Option<f64> {
    Moments::of(values)?.excess_kurtosis()
}

/// Mean and standard deviation with `ddof` delta degrees of freedom.
///
/// Returns `None` when the sample has no more than `ddof` values.
pub fn mean_std(values: &[f64], ddof: usize) -> Option<(f64, f64)> {
    let n = values.len();
    if n == 0 || n <= ddof {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    Some((mean, (ss / (n - ddof) as f64).sqrt()))
}

/// Quantile of an ascending-sorted sample with linear interpolation between
/// closest ranks. `q` is clamped to [0, 1].
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Median of a sample. Sorts `values` in place.
pub fn median(values: &mut [f64]) -> Option<f64> {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    quantile(values, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moments_symmetric() {
        let m = Moments::of(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_relative_eq!(m.mean, 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.m2, 2.0, epsilon = 1e-12);
        assert!(m.skewness().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_skewness_sign() {
        assert!(sample_skewness(&[0.0, 0.0, 0.0, 0.0, 1.0, 10.0]).unwrap() > 0.0);
        assert!(sample_skewness(&[0.0, -1.0, -10.0, 0.0, 0.0, 0.0]).unwrap() < 0.0);
    }

    #[test]
    fn test_excess_kurtosis_reference() {
        // m2 = 10, m4 = 278.8, g2 = -0.212 -> G2 = 4.728 * 4 / 6
        let g2 = sample_excess_kurtosis(&[1.0, 2.0, 3.0, 4.0, 10.0]).unwrap();
        assert!((g2 - 3.152).abs() < 1e-9, "G2 = {}", g2);
    }

    #[test]
    fn test_constant_sample_has_no_shape() {
        let m = Moments::of(&[2.0; 10]).unwrap();
        assert!(m.skewness().is_none());
        assert!(m.excess_kurtosis().is_none());
    }

    #[test]
    fn test_mean_std_ddof() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 0).unwrap();
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);

        let (_, sample_std) = mean_std(&[1.0, 3.0], 1).unwrap();
        assert!((sample_std - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!(mean_std(&[1.0], 1).is_none());
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile(&sorted, 0.0), Some(0.0));
        assert_eq!(quantile(&sorted, 1.0), Some(40.0));
        assert!((quantile(&sorted, 0.125).unwrap() - 5.0).abs() < 1e-12);
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
