// Kruskal-Wallis H test with midrank tie correction and eta-squared effect
// size, the omnibus test of the experiment.

use serde::Serialize;

use super::distributions::chi_squared_sf;
use super::{midranks, tie_term, ALPHA};

#[derive(Debug, Clone, Serialize)]
pub struct KruskalResult {
    pub metric: String,
    pub h_statistic: f64,
    pub p_value: f64,
    pub degrees_freedom: usize,
    pub effect_size_eta_squared: f64,
    pub effect_size_interpretation: &'static str,
    pub significant: bool,
    /// Space-separated group labels, in test order.
    pub groups: String,
    pub group_sizes: String,
}

/// Returns None when fewer than two non-empty groups remain.
pub fn kruskal_wallis(metric: &str, groups: &[(String, Vec<f64>)]) -> Option<KruskalResult> {
    let groups: Vec<&(String, Vec<f64>)> =
        groups.iter().filter(|(_, v)| !v.is_empty()).collect();
    if groups.len() < 2 {
        return None;
    }

    let k = groups.len();
    let pooled: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let n = pooled.len();
    let ranks = midranks(&pooled);

    let mut h = 0.0;
    let mut offset = 0;
    for (_, values) in &groups {
        let ni = values.len();
        let rank_sum: f64 = ranks[offset..offset + ni].iter().sum();
        h += rank_sum * rank_sum / ni as f64;
        offset += ni;
    }
    let nf = n as f64;
    h = 12.0 / (nf * (nf + 1.0)) * h - 3.0 * (nf + 1.0);

    // Tie correction; all-identical data leaves H at 0.
    let correction = 1.0 - tie_term(&pooled) / (nf * nf * nf - nf);
    if correction > 0.0 {
        h /= correction;
    } else {
        h = 0.0;
    }

    let degrees_freedom = k - 1;
    let p_value = chi_squared_sf(h, degrees_freedom);

    let effect_size_eta_squared = if n > k {
        (h - k as f64 + 1.0) / (nf - k as f64)
    } else {
        0.0
    };

    Some(KruskalResult {
        metric: metric.to_string(),
        h_statistic: h,
        p_value,
        degrees_freedom,
        effect_size_eta_squared,
        effect_size_interpretation: interpret_eta_squared(effect_size_eta_squared),
        significant: p_value < ALPHA,
        groups: groups
            .iter()
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        group_sizes: groups
            .iter()
            .map(|(_, v)| v.len().to_string())
            .collect::<Vec<_>>()
            .join(" "),
    })
}

fn interpret_eta_squared(eta_squared: f64) -> &'static str {
    if eta_squared < 0.01 {
        "Small"
    } else if eta_squared < 0.06 {
        "Medium"
    } else {
        "Large"
    }
}
