// Batch extraction: for each configured treatment iteration, fetch the run,
// trim inactivity, label the retained samples, and export one CSV per
// treatment.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::metrics_repo::MetricsRepo;
use crate::models::ResponseRow;
use crate::segmenter;

/// Paths of the per-treatment CSVs that were actually written.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub csv_paths: Vec<PathBuf>,
}

pub async fn run(config: &AppConfig, repo: &MetricsRepo) -> anyhow::Result<PipelineOutcome> {
    let tz = config.timezone()?;
    let out_dir = Path::new(&config.output.dir);
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;

    let cap = config.experiment.max_minutes_without_players;
    let windows = config.windows()?;
    let mut outcome = PipelineOutcome::default();

    for treatment in &config.treatments {
        let mut rows: Vec<ResponseRow> = Vec::new();

        for iteration in &treatment.iterations {
            let window = windows
                .iter()
                .find(|w| w.treatment_id == treatment.id && w.iteration_id == iteration.id)
                .context("window resolution out of sync with config")?;

            info!(
                treatment = %treatment.id,
                iteration = %iteration.id,
                start = %iteration.start,
                end = %iteration.end,
                "extracting window"
            );
            let samples = repo.fetch_run(window.start_ms, window.end_ms).await?;
            if samples.is_empty() {
                warn!(
                    treatment = %treatment.id,
                    iteration = %iteration.id,
                    "no rows in window, skipping iteration"
                );
                continue;
            }
            if samples.iter().all(|s| s.is_inactive()) {
                warn!(
                    treatment = %treatment.id,
                    iteration = %iteration.id,
                    "no players online during iteration"
                );
            }

            let (segments, stats) = segmenter::segment_run(samples, cap);
            info!(
                treatment = %treatment.id,
                iteration = %iteration.id,
                segments = segments.len(),
                total_minutes = format!("{:.1}", stats.total_minutes),
                accepted_minutes = format!("{:.1}", stats.accepted_minutes),
                rejected_minutes = format!("{:.1}", stats.rejected_minutes),
                "trimmed inactive periods"
            );
            for span in &stats.discarded {
                debug!(
                    start = %span.start,
                    end = %span.end,
                    minutes = format!("{:.1}", span.duration_minutes),
                    "discarded span"
                );
            }
            for segment in &segments {
                debug!(
                    start = %segment.start(),
                    minutes = format!("{:.1}", segment.duration_minutes()),
                    samples = segment.samples.len(),
                    "retained segment"
                );
            }

            for segment in &segments {
                for sample in &segment.samples {
                    rows.push(ResponseRow::from_sample(
                        sample,
                        tz,
                        &treatment.id,
                        &iteration.id,
                    ));
                }
            }
        }

        if rows.is_empty() {
            warn!(treatment = %treatment.id, "no data for treatment, no CSV written");
            continue;
        }
        let path = out_dir.join(format!("{}_response_variables.csv", treatment.id));
        write_response_csv(&path, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "exported treatment CSV");
        outcome.csv_paths.push(path);
    }

    Ok(outcome)
}

pub fn write_response_csv(path: &Path, rows: &[ResponseRow]) -> anyhow::Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_response_csv(path: &Path) -> anyhow::Result<Vec<ResponseRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Combined rows from every exported treatment CSV, for the analysis stage.
pub fn read_all_responses(paths: &[PathBuf]) -> anyhow::Result<Vec<ResponseRow>> {
    let mut all = Vec::new();
    for path in paths {
        all.extend(read_response_csv(path)?);
    }
    Ok(all)
}
