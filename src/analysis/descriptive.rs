// Descriptive statistics for one group of observations.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptive {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

pub fn describe(values: &[f64]) -> Option<Descriptive> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = sorted.len();
    let mean = mean(&sorted);
    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);

    // Sample standard deviation (ddof = 1), 0 for a single observation.
    let std_dev = if n > 1 {
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };

    Some(Descriptive {
        n,
        min: sorted[0],
        max: sorted[n - 1],
        mean,
        std_dev,
        median: percentile(&sorted, 50.0),
        q1,
        q3,
        iqr: q3 - q1,
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    percentile(&sorted, 50.0)
}

/// Linearly interpolated percentile over pre-sorted data, p in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
