use anyhow::Context;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use serde::Deserialize;

/// Windows are written as local wall-clock times in the experiment timezone.
const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub experiment: ExperimentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "treatment")]
    pub treatments: Vec<TreatmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    /// IANA timezone the treatment windows are written in.
    pub timezone: String,
    /// Inactivity cap: longer zero-player periods are trimmed to this.
    pub max_minutes_without_players: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentConfig {
    pub id: String,
    #[serde(default, rename = "iteration")]
    pub iterations: Vec<IterationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IterationConfig {
    pub id: String,
    pub start: String,
    pub end: String,
}

/// One resolved extraction window: local start/end converted to the UTC
/// epoch-millis range the Plan tables are keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentWindow {
    pub treatment_id: String,
    pub iteration_id: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.experiment
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("experiment.timezone: {e}"))
    }

    /// Resolves every treatment iteration into a UTC epoch-millis window,
    /// in config order.
    pub fn windows(&self) -> anyhow::Result<Vec<TreatmentWindow>> {
        let tz = self.timezone()?;
        let mut out = Vec::new();
        for treatment in &self.treatments {
            for iteration in &treatment.iterations {
                out.push(TreatmentWindow {
                    treatment_id: treatment.id.clone(),
                    iteration_id: iteration.id.clone(),
                    start_ms: local_to_utc_ms(&iteration.start, tz)?,
                    end_ms: local_to_utc_ms(&iteration.end, tz)?,
                });
            }
        }
        Ok(out)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.experiment.timezone.parse::<Tz>().is_ok(),
            "experiment.timezone is not a known IANA timezone: {}",
            self.experiment.timezone
        );
        anyhow::ensure!(
            self.experiment.max_minutes_without_players.is_finite()
                && self.experiment.max_minutes_without_players >= 0.0,
            "experiment.max_minutes_without_players must be >= 0, got {}",
            self.experiment.max_minutes_without_players
        );
        anyhow::ensure!(!self.output.dir.is_empty(), "output.dir must be non-empty");
        anyhow::ensure!(
            !self.treatments.is_empty(),
            "at least one [[treatment]] is required"
        );
        for treatment in &self.treatments {
            anyhow::ensure!(
                !treatment.iterations.is_empty(),
                "treatment {} has no iterations",
                treatment.id
            );
            for iteration in &treatment.iterations {
                let start = parse_window(&iteration.start).with_context(|| {
                    format!("treatment {} iteration {} start", treatment.id, iteration.id)
                })?;
                let end = parse_window(&iteration.end).with_context(|| {
                    format!("treatment {} iteration {} end", treatment.id, iteration.id)
                })?;
                anyhow::ensure!(
                    start < end,
                    "treatment {} iteration {} window is empty or reversed ({} >= {})",
                    treatment.id,
                    iteration.id,
                    iteration.start,
                    iteration.end
                );
            }
        }
        Ok(())
    }
}

fn parse_window(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, WINDOW_FORMAT)
        .with_context(|| format!("expected \"YYYY-MM-DD HH:MM\", got \"{s}\""))
}

fn local_to_utc_ms(s: &str, tz: Tz) -> anyhow::Result<i64> {
    let naive = parse_window(s)?;
    // earliest() resolves DST-ambiguous wall times to the first occurrence.
    let local = naive
        .and_local_timezone(tz)
        .earliest()
        .ok_or_else(|| anyhow::anyhow!("{s} does not exist in timezone {tz}"))?;
    Ok(local.timestamp_millis())
}
