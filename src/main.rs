use anyhow::Result;
use mcperf::*;
use std::path::Path;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    tracing::info!(
        "{} {} starting",
        version::NAME,
        version::VERSION
    );

    let app_config = config::AppConfig::load()?;
    let repo = metrics_repo::MetricsRepo::connect(&app_config.database.path).await?;

    let outcome = pipeline::run(&app_config, &repo).await?;
    if outcome.csv_paths.is_empty() {
        tracing::warn!("no treatment produced any data, nothing to analyze");
        return Ok(());
    }

    let rows = pipeline::read_all_responses(&outcome.csv_paths)?;
    let out_dir = Path::new(&app_config.output.dir);

    let summaries = report::summarize(&rows);
    report::write_markdown(&out_dir.join("treatment_summary.md"), &summaries)?;

    analysis::run_analysis(&rows, &out_dir.join("analysis"))?;

    tracing::info!("pipeline complete");
    Ok(())
}
