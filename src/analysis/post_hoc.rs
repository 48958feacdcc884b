// Pairwise Mann-Whitney U comparisons after a significant Kruskal-Wallis
// result, with Bonferroni correction and effect size r = |z| / sqrt(N).

use serde::Serialize;

use super::descriptive::median;
use super::distributions::normal_sf;
use super::{midranks, tie_term};

#[derive(Debug, Clone, Serialize)]
pub struct PairwiseComparison {
    pub metric: String,
    pub group1: String,
    pub group2: String,
    pub u_statistic: f64,
    pub p_value: f64,
    pub p_bonferroni: f64,
    pub significant_uncorrected: bool,
    pub significant_bonferroni: bool,
    pub effect_size_r: f64,
    pub effect_interpretation: &'static str,
    pub median_group1: f64,
    pub median_group2: f64,
    pub mean_rank_group1: f64,
    pub mean_rank_group2: f64,
    pub n_group1: usize,
    pub n_group2: usize,
    /// Group with the higher median.
    pub winner: String,
}

/// All pairwise comparisons for one metric; groups with no data are left
/// out of the pairing.
pub fn dunn_post_hoc(
    metric: &str,
    groups: &[(String, Vec<f64>)],
    alpha: f64,
) -> Vec<PairwiseComparison> {
    let groups: Vec<&(String, Vec<f64>)> =
        groups.iter().filter(|(_, v)| !v.is_empty()).collect();
    if groups.len() < 2 {
        return Vec::new();
    }

    let pair_count = groups.len() * (groups.len() - 1) / 2;
    let bonferroni_alpha = alpha / pair_count as f64;

    let mut out = Vec::with_capacity(pair_count);
    for i in 0..groups.len() {
        for j in i + 1..groups.len() {
            let (name1, g1) = groups[i];
            let (name2, g2) = groups[j];

            let (u_statistic, p_value) = mann_whitney_u(g1, g2);

            let n1 = g1.len();
            let n2 = g2.len();
            let n = (n1 + n2) as f64;

            // Effect size from the plain normal approximation of U.
            let sigma = (n1 as f64 * n2 as f64 * (n + 1.0) / 12.0).sqrt();
            let z_approx = if sigma > 0.0 {
                (u_statistic - n1 as f64 * n2 as f64 / 2.0) / sigma
            } else {
                0.0
            };
            let effect_size_r = z_approx.abs() / n.sqrt();

            let pooled: Vec<f64> = g1.iter().chain(g2.iter()).copied().collect();
            let ranks = midranks(&pooled);
            let mean_rank_group1 = ranks[..n1].iter().sum::<f64>() / n1 as f64;
            let mean_rank_group2 = ranks[n1..].iter().sum::<f64>() / n2 as f64;

            let median_group1 = median(g1);
            let median_group2 = median(g2);
            let winner = if median_group1 > median_group2 {
                name1.clone()
            } else {
                name2.clone()
            };

            out.push(PairwiseComparison {
                metric: metric.to_string(),
                group1: name1.clone(),
                group2: name2.clone(),
                u_statistic,
                p_value,
                p_bonferroni: (p_value * pair_count as f64).min(1.0),
                significant_uncorrected: p_value < alpha,
                significant_bonferroni: p_value < bonferroni_alpha,
                effect_size_r,
                effect_interpretation: interpret_r(effect_size_r),
                median_group1,
                median_group2,
                mean_rank_group1,
                mean_rank_group2,
                n_group1: n1,
                n_group2: n2,
                winner,
            });
        }
    }
    out
}

/// Two-sided Mann-Whitney U: returns (U of the first group, p-value) using
/// the tie-corrected normal approximation with continuity correction.
pub fn mann_whitney_u(g1: &[f64], g2: &[f64]) -> (f64, f64) {
    let n1 = g1.len();
    let n2 = g2.len();
    if n1 == 0 || n2 == 0 {
        return (0.0, 1.0);
    }

    let pooled: Vec<f64> = g1.iter().chain(g2.iter()).copied().collect();
    let ranks = midranks(&pooled);
    let rank_sum1: f64 = ranks[..n1].iter().sum();
    let u1 = rank_sum1 - n1 as f64 * (n1 as f64 + 1.0) / 2.0;

    let n = (n1 + n2) as f64;
    let mean_u = n1 as f64 * n2 as f64 / 2.0;
    let tie_adjustment = tie_term(&pooled) / (n * (n - 1.0));
    let variance = n1 as f64 * n2 as f64 / 12.0 * ((n + 1.0) - tie_adjustment);
    if variance <= 0.0 {
        // All observations tied: no evidence of a difference.
        return (u1, 1.0);
    }

    let z = ((u1 - mean_u).abs() - 0.5).max(0.0) / variance.sqrt();
    let p_value = (2.0 * normal_sf(z)).min(1.0);
    (u1, p_value)
}

fn interpret_r(r: f64) -> &'static str {
    if r < 0.1 {
        "Negligible"
    } else if r < 0.3 {
        "Small"
    } else if r < 0.5 {
        "Medium"
    } else {
        "Large"
    }
}
