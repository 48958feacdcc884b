// Non-parametric analysis across treatments: descriptive group stats,
// Kruskal-Wallis, and pairwise Mann-Whitney post-hoc comparisons.
// Operates on the exported response rows; results land in CSV tables.

pub mod descriptive;
pub mod distributions;
pub mod kruskal;
pub mod post_hoc;

use std::cmp::Ordering;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::ResponseRow;

pub const ALPHA: f64 = 0.05;

/// Response variables the tests run over (the original experiment's
/// Kruskal-Wallis battery).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Tps,
    CpuUsage,
    RamUsage,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Tps, Metric::CpuUsage, Metric::RamUsage];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Tps => "tps",
            Metric::CpuUsage => "cpu_usage",
            Metric::RamUsage => "ram_usage",
        }
    }

    pub fn extract(&self, row: &ResponseRow) -> Option<f64> {
        match self {
            Metric::Tps => row.tps,
            Metric::CpuUsage => row.cpu_usage,
            Metric::RamUsage => row.ram_usage,
        }
    }
}

#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    pub kruskal: Vec<kruskal::KruskalResult>,
    pub comparisons: Vec<post_hoc::PairwiseComparison>,
}

/// Runs the full battery and writes `kruskal_wallis_results.csv` plus, when
/// any metric is significant, `post_hoc_results.csv` under `out_dir`.
pub fn run_analysis(rows: &[ResponseRow], out_dir: &Path) -> anyhow::Result<AnalysisOutcome> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating analysis dir {}", out_dir.display()))?;

    let mut outcome = AnalysisOutcome::default();

    for metric in Metric::ALL {
        let groups = group_by_treatment(rows, metric);
        for (treatment, values) in &groups {
            if let Some(d) = descriptive::describe(values) {
                info!(
                    metric = metric.name(),
                    treatment = %treatment,
                    n = d.n,
                    median = format!("{:.2}", d.median),
                    iqr = format!("{:.2}", d.iqr),
                    "group stats"
                );
            }
        }

        match kruskal::kruskal_wallis(metric.name(), &groups) {
            Some(result) => {
                info!(
                    metric = metric.name(),
                    h = format!("{:.4}", result.h_statistic),
                    p = format!("{:.6}", result.p_value),
                    eta_squared = format!("{:.4}", result.effect_size_eta_squared),
                    significant = result.significant,
                    "kruskal-wallis"
                );
                outcome.kruskal.push(result);
            }
            None => warn!(metric = metric.name(), "not enough groups, test skipped"),
        }
    }

    if !outcome.kruskal.is_empty() {
        write_results_csv(&out_dir.join("kruskal_wallis_results.csv"), &outcome.kruskal)?;
    }

    for metric in Metric::ALL {
        let significant = outcome
            .kruskal
            .iter()
            .any(|r| r.metric == metric.name() && r.significant);
        if !significant {
            continue;
        }
        let groups = group_by_treatment(rows, metric);
        let comparisons = post_hoc::dunn_post_hoc(metric.name(), &groups, ALPHA);
        info!(
            metric = metric.name(),
            pairs = comparisons.len(),
            significant_pairs = comparisons.iter().filter(|c| c.significant_bonferroni).count(),
            "post-hoc comparisons"
        );
        outcome.comparisons.extend(comparisons);
    }

    if !outcome.comparisons.is_empty() {
        write_results_csv(&out_dir.join("post_hoc_results.csv"), &outcome.comparisons)?;
    }

    Ok(outcome)
}

/// Finite metric values per treatment, treatments in sorted order (the NA
/// drop of the original scripts).
pub fn group_by_treatment(rows: &[ResponseRow], metric: Metric) -> Vec<(String, Vec<f64>)> {
    let mut groups: std::collections::BTreeMap<String, Vec<f64>> = Default::default();
    for row in rows {
        let entry = groups.entry(row.treatment.clone()).or_default();
        if let Some(v) = metric.extract(row) {
            if v.is_finite() {
                entry.push(v);
            }
        }
    }
    groups.into_iter().collect()
}

fn write_results_csv<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = records.len(), "wrote results table");
    Ok(())
}

/// 1-based midranks in input order; tied values share the average of the
/// ranks they occupy.
pub(crate) fn midranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let midrank = (i + j + 2) as f64 / 2.0;
        for &k in &order[i..=j] {
            ranks[k] = midrank;
        }
        i = j + 1;
    }
    ranks
}

/// Tie term sum(t^3 - t) over tie group sizes t, for rank-test corrections.
pub(crate) fn tie_term(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mut term = 0.0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        let t = (j - i + 1) as f64;
        term += t * t * t - t;
        i = j + 1;
    }
    term
}
