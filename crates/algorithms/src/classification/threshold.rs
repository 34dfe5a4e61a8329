//! Histogram thresholding of change scores
//!
//! Otsu maximises the between-class variance; Kittler-Illingworth minimises
//! the classification error of a two-Gaussian mixture:
//!
//! `J(t) = 1 + 2 (P1 ln s1 + P2 ln s2) - 2 (P1 ln P1 + P2 ln P2)`
//!
//! Both operate on a fixed-bin histogram and return the upper edge of the
//! selected bin, so `value < threshold` selects the dark class.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use sarflood_core::{Error, Mask, Raster, Result};

use crate::statistics::quantile;

/// Thresholding method
///
/// Configuration files and the command line both go through `FromStr`, so an
/// unknown name is always `Error::ThresholdingMethodUnknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThresholdMethod {
    #[default]
    Otsu,
    KittlerIllingworth,
}

impl TryFrom<String> for ThresholdMethod {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ThresholdMethod> for String {
    fn from(method: ThresholdMethod) -> Self {
        method.to_string()
    }
}

impl FromStr for ThresholdMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "otsu" => Ok(ThresholdMethod::Otsu),
            "kittler" | "kittler-illingworth" | "kittler_illingworth" | "ki" => {
                Ok(ThresholdMethod::KittlerIllingworth)
            }
            _ => Err(Error::ThresholdingMethodUnknown(s.to_string())),
        }
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdMethod::Otsu => write!(f, "otsu"),
            ThresholdMethod::KittlerIllingworth => write!(f, "kittler"),
        }
    }
}

/// Normalised histogram over [min, max]
struct Histogram {
    p: Vec<f64>,
    min: f64,
    width: f64,
}

impl Histogram {
    /// `None` when fewer than two distinct finite values exist
    fn new(values: &[f64], bins: usize) -> Option<Self> {
        let bins = bins.max(2);
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        let mut n = 0usize;
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
            n += 1;
        }
        if n == 0 || max <= min {
            return None;
        }

        let width = (max - min) / bins as f64;
        let mut p = vec![0.0; bins];
        for &v in values.iter().filter(|v| v.is_finite()) {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            p[idx] += 1.0;
        }
        for c in p.iter_mut() {
            *c /= n as f64;
        }
        Some(Self { p, min, width })
    }

    /// Upper edge of bin `t`
    fn edge(&self, t: usize) -> f64 {
        self.min + (t + 1) as f64 * self.width
    }
}

/// Otsu threshold of `values` on a `bins`-bin histogram
pub fn otsu_threshold(values: &[f64], bins: usize) -> Option<f64> {
    let hist = Histogram::new(values, bins)?;
    otsu_bin(&hist).map(|t| hist.edge(t))
}

fn otsu_bin(hist: &Histogram) -> Option<usize> {
    let mu_total: f64 = hist.p.iter().enumerate().map(|(i, p)| i as f64 * p).sum();

    let mut omega = 0.0;
    let mut mu = 0.0;
    let mut best: Option<(usize, f64)> = None;

    for t in 0..hist.p.len() - 1 {
        omega += hist.p[t];
        mu += t as f64 * hist.p[t];
        let denom = omega * (1.0 - omega);
        if denom <= 0.0 {
            continue;
        }
        let between = (mu_total * omega - mu).powi(2) / denom;
        if best.map_or(true, |(_, b)| between > b) {
            best = Some((t, between));
        }
    }
    best.map(|(t, _)| t)
}

/// Kittler-Illingworth minimum-error threshold of `values`.
///
/// Falls back to Otsu when no split yields two classes with non-zero variance.
pub fn kittler_illingworth_threshold(values: &[f64], bins: usize) -> Option<f64> {
    let hist = Histogram::new(values, bins)?;

    let (mut c0, mut c1, mut c2) = (0.0, 0.0, 0.0);
    let total1: f64 = hist.p.iter().enumerate().map(|(i, p)| i as f64 * p).sum();
    let total2: f64 = hist.p.iter().enumerate().map(|(i, p)| (i * i) as f64 * p).sum();

    let mut best: Option<(usize, f64)> = None;
    for t in 0..hist.p.len() - 1 {
        let x = t as f64;
        c0 += hist.p[t];
        c1 += x * hist.p[t];
        c2 += x * x * hist.p[t];

        let p1 = c0;
        let p2 = 1.0 - c0;
        if p1 <= 1e-12 || p2 <= 1e-12 {
            continue;
        }
        let m1 = c1 / p1;
        let m2 = (total1 - c1) / p2;
        let v1 = c2 / p1 - m1 * m1;
        let v2 = (total2 - c2) / p2 - m2 * m2;
        if v1 <= 1e-12 || v2 <= 1e-12 {
            continue;
        }

        let j = 1.0 + (p1 * v1.ln() + p2 * v2.ln()) - 2.0 * (p1 * p1.ln() + p2 * p2.ln());
        if best.map_or(true, |(_, b)| j < b) {
            best = Some((t, j));
        }
    }

    match best {
        Some((t, _)) => Some(hist.edge(t)),
        None => {
            debug!("Kittler-Illingworth has no two-class split, using Otsu");
            otsu_bin(&hist).map(|t| hist.edge(t))
        }
    }
}

/// Threshold `values` with `method`
pub fn compute_threshold(values: &[f64], method: ThresholdMethod, bins: usize) -> Option<f64> {
    match method {
        ThresholdMethod::Otsu => otsu_threshold(values, bins),
        ThresholdMethod::KittlerIllingworth => kittler_illingworth_threshold(values, bins),
    }
}

/// Parameters for global thresholding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalThresholdParams {
    pub method: ThresholdMethod,
    pub bins: usize,
    pub clip_low_quantile: f64,
    pub clip_high_quantile: f64,
}

impl Default for GlobalThresholdParams {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::Otsu,
            bins: 256,
            clip_low_quantile: 0.01,
            clip_high_quantile: 0.99,
        }
    }
}

impl GlobalThresholdParams {
    pub fn validate(&self) -> Result<()> {
        if self.bins < 2 {
            return Err(Error::InvalidParameter {
                name: "bins",
                value: self.bins.to_string(),
                reason: "histogram needs at least 2 bins".to_string(),
            });
        }
        let (lo, hi) = (self.clip_low_quantile, self.clip_high_quantile);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
            return Err(Error::InvalidParameter {
                name: "clip_quantiles",
                value: format!("({}, {})", lo, hi),
                reason: "quantiles must satisfy 0 <= low < high <= 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Result of global thresholding
#[derive(Debug, Clone)]
pub struct GlobalThreshold {
    /// `None` when the population was empty or constant
    pub threshold: Option<f64>,
    /// Initial water seed
    pub seed: Mask,
    /// Number of pixels the threshold was estimated from
    pub population: usize,
}

/// Threshold the scores selected by `bimodality` and derive the water seed.
///
/// The population is clipped to its quantiles before the histogram is
/// built. Seed pixels are valid pixels with `score < threshold`, minus any
/// pixel set in `exclusion`.
pub fn global_threshold(
    score: &Raster<f32>,
    bimodality: &Mask,
    exclusion: Option<&Mask>,
    params: &GlobalThresholdParams,
) -> Result<GlobalThreshold> {
    params.validate()?;
    score.ensure_same_shape(bimodality)?;
    if let Some(ex) = exclusion {
        score.ensure_same_shape(ex)?;
    }

    let mut population: Vec<f64> = score
        .data()
        .iter()
        .zip(bimodality.data().iter())
        .filter(|&(&v, &m)| m != 0 && !score.is_nodata(v))
        .map(|(&v, _)| v as f64)
        .collect();
    let count = population.len();

    population.sort_unstable_by(|a, b| a.total_cmp(b));
    if let (Some(lo), Some(hi)) = (
        quantile(&population, params.clip_low_quantile),
        quantile(&population, params.clip_high_quantile),
    ) {
        for v in population.iter_mut() {
            *v = v.clamp(lo, hi);
        }
    }

    let threshold = compute_threshold(&population, params.method, params.bins);

    let mut seed = match threshold {
        Some(t) => score.mask_where(|v| (v as f64) < t),
        None => score.mask_where(|_| false),
    };
    if let Some(ex) = exclusion {
        for (s, &e) in seed.data_mut().iter_mut().zip(ex.data().iter()) {
            if e != 0 {
                *s = 0;
            }
        }
    }

    info!(
        method = %params.method,
        threshold = ?threshold,
        population = count,
        seed_pixels = seed.count_set(),
        "global threshold"
    );

    Ok(GlobalThreshold {
        threshold,
        seed,
        population: count,
    })
}
