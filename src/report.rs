// Treatment summary table: per-treatment min/max/mean for the three server
// metrics, written as Markdown next to the exported CSVs.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::analysis::descriptive::describe;
use crate::analysis::{group_by_treatment, Metric};
use crate::models::ResponseRow;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentSummary {
    pub treatment: String,
    pub tps: MetricSummary,
    pub cpu: MetricSummary,
    pub ram: MetricSummary,
}

/// One summary row per treatment, in sorted treatment order. Treatments
/// with no finite values for a metric report zeros rather than dropping
/// the row.
pub fn summarize(rows: &[ResponseRow]) -> Vec<TreatmentSummary> {
    let tps = group_by_treatment(rows, Metric::Tps);
    let cpu = group_by_treatment(rows, Metric::CpuUsage);
    let ram = group_by_treatment(rows, Metric::RamUsage);

    tps.iter()
        .map(|(treatment, tps_values)| TreatmentSummary {
            treatment: treatment.clone(),
            tps: metric_summary(tps_values),
            cpu: metric_summary(lookup(&cpu, treatment)),
            ram: metric_summary(lookup(&ram, treatment)),
        })
        .collect()
}

fn lookup<'a>(groups: &'a [(String, Vec<f64>)], treatment: &str) -> &'a [f64] {
    groups
        .iter()
        .find(|(id, _)| id == treatment)
        .map(|(_, v)| v.as_slice())
        .unwrap_or(&[])
}

fn metric_summary(values: &[f64]) -> MetricSummary {
    match describe(values) {
        Some(d) => MetricSummary {
            min: d.min,
            max: d.max,
            mean: d.mean,
        },
        None => MetricSummary {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        },
    }
}

pub fn write_markdown(path: &Path, summaries: &[TreatmentSummary]) -> anyhow::Result<()> {
    let mut content = String::from(
        "# Minecraft Server Performance - Treatment Summary\n\n\
         | Treatment | TPS Min | TPS Max | TPS Mean | CPU Min | CPU Max | CPU Mean | RAM Min | RAM Max | RAM Mean |\n\
         |-----------|---------|---------|----------|---------|---------|----------|---------|---------|----------|\n",
    );
    for s in summaries {
        content.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.0} | {:.0} | {:.0} |\n",
            s.treatment,
            s.tps.min,
            s.tps.max,
            s.tps.mean,
            s.cpu.min,
            s.cpu.max,
            s.cpu.mean,
            s.ram.min,
            s.ram.max,
            s.ram.mean,
        ));
    }
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), treatments = summaries.len(), "wrote summary table");
    Ok(())
}
