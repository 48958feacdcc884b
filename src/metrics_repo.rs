// Read-only extraction from a Plan plugin SQLite database.
// plan_tps carries tps/cpu/ram/players per timestamp; plan_ping is averaged
// per timestamp and merged backward onto the tps rows (nearest previous).

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, instrument};

use crate::models::Sample;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("database file not found: {0}")]
    DatabaseNotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct MetricsRepo {
    pool: SqlitePool,
}

impl MetricsRepo {
    /// Opens an existing Plan database read-only. The experiment never
    /// writes back to the server's data.
    pub async fn connect(path: &str) -> Result<Self, MetricsError> {
        if !Path::new(path).exists() {
            return Err(MetricsError::DatabaseNotFound(path.to_string()));
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .read_only(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    /// TPS rows in [from_ms, to_ms], ascending. Nullable columns stay None;
    /// a players_online value that cannot be read as an integer is treated
    /// as missing rather than failing the batch.
    #[instrument(skip(self), fields(repo = "metrics", operation = "fetch_tps_range"))]
    pub async fn fetch_tps_range(
        &self,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<Sample>, MetricsError> {
        let rows = sqlx::query(
            "SELECT date, tps, cpu_usage, ram_usage, players_online
             FROM plan_tps WHERE date BETWEEN $1 AND $2 ORDER BY date ASC",
        )
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let date: i64 = row.try_get("date")?;
            let Some(timestamp) = DateTime::from_timestamp_millis(date) else {
                debug!(date, "skipping row with out-of-range timestamp");
                continue;
            };
            let players_online = row
                .try_get::<Option<i64>, _>("players_online")
                .ok()
                .flatten()
                .and_then(|p| u32::try_from(p).ok());
            out.push(Sample {
                timestamp,
                players_online,
                tps: row.try_get("tps")?,
                cpu_usage: row.try_get("cpu_usage")?,
                ram_usage: row.try_get("ram_usage")?,
                avg_ping: None,
            });
        }
        Ok(out)
    }

    /// Per-timestamp average ping in [from_ms, to_ms], ascending.
    #[instrument(skip(self), fields(repo = "metrics", operation = "fetch_avg_ping_range"))]
    pub async fn fetch_avg_ping_range(
        &self,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, MetricsError> {
        let rows = sqlx::query(
            "SELECT date, AVG(avg_ping) AS avg_ping
             FROM plan_ping WHERE date BETWEEN $1 AND $2
             GROUP BY date ORDER BY date ASC",
        )
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let date: i64 = row.try_get("date")?;
            let avg_ping: Option<f64> = row.try_get("avg_ping")?;
            let (Some(timestamp), Some(avg_ping)) =
                (DateTime::from_timestamp_millis(date), avg_ping)
            else {
                continue;
            };
            out.push((timestamp, avg_ping));
        }
        Ok(out)
    }

    /// One run for an extraction window: tps rows with ping merged in.
    #[instrument(skip(self), fields(repo = "metrics", operation = "fetch_run"))]
    pub async fn fetch_run(&self, from_ms: i64, to_ms: i64) -> Result<Vec<Sample>, MetricsError> {
        let mut samples = self.fetch_tps_range(from_ms, to_ms).await?;
        let pings = self.fetch_avg_ping_range(from_ms, to_ms).await?;
        merge_ping_backward(&mut samples, &pings);
        Ok(samples)
    }
}

/// Backward as-of merge: each sample takes the latest ping at or before its
/// timestamp. Both inputs are ascending; samples with no earlier ping keep
/// None.
pub fn merge_ping_backward(samples: &mut [Sample], pings: &[(DateTime<Utc>, f64)]) {
    let mut next = 0usize;
    let mut latest: Option<f64> = None;
    for sample in samples.iter_mut() {
        while next < pings.len() && pings[next].0 <= sample.timestamp {
            latest = Some(pings[next].1);
            next += 1;
        }
        sample.avg_ping = latest;
    }
}
