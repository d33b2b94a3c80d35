//! Elapsed-time recalculation
//!
//! A maintenance sweep that runs on its own timer, independent of request
//! handling. Every pass overwrites `time_elapsed` for all plants with the
//! milliseconds since their `start_time`, committed as one batch. It never
//! reschedules or resets anything.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::config::RecalcConfig;
use crate::db::parse_timestamp;
use crate::error::Result;
use crate::DbPool;

/// Recomputes `time_elapsed` across all plants
pub struct ElapsedRecalculator {
    db: DbPool,
    config: RecalcConfig,
}

impl ElapsedRecalculator {
    pub fn new(db: DbPool, config: RecalcConfig) -> Self {
        Self { db, config }
    }

    /// Run a single sweep using the current time
    pub async fn run_once(&self) -> Result<RecalcStats> {
        self.run_at(Utc::now()).await
    }

    /// Run a single sweep as of `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RecalcStats> {
        let mut stats = RecalcStats::default();

        let mut tx = self.db.begin().await?;

        // Touch every row first so the batch holds the write lock from the start
        sqlx::query("UPDATE plants SET time_elapsed = time_elapsed")
            .execute(&mut *tx)
            .await?;

        let plants: Vec<(i64, String, f64)> =
            sqlx::query_as("SELECT id, start_time, watering_time FROM plants")
                .fetch_all(&mut *tx)
                .await?;

        for (id, start_time, watering_time) in plants {
            let start = match parse_timestamp(&start_time) {
                Ok(start) => start,
                Err(e) => {
                    tracing::warn!(plant_id = id, error = %e, "Skipping plant with unreadable start_time");
                    stats.skipped += 1;
                    continue;
                }
            };

            let elapsed = elapsed_millis(start, now, watering_time, self.config.cap_at_watering_time);

            sqlx::query("UPDATE plants SET time_elapsed = ? WHERE id = ?")
                .bind(elapsed)
                .bind(id)
                .execute(&mut *tx)
                .await?;

            stats.updated += 1;
            if elapsed >= watering_time {
                stats.due += 1;
            }
        }

        tx.commit().await?;

        tracing::info!(
            updated = stats.updated,
            due = stats.due,
            skipped = stats.skipped,
            "Elapsed-time sweep completed"
        );

        Ok(stats)
    }
}

/// Milliseconds between `start` and `now`, optionally capped at the cycle length
pub fn elapsed_millis(start: DateTime<Utc>, now: DateTime<Utc>, watering_time: f64, cap: bool) -> f64 {
    let elapsed = match (now - start).num_microseconds() {
        Some(micros) => micros as f64 / 1000.0,
        None => (now - start).num_milliseconds() as f64,
    };

    if cap {
        elapsed.min(watering_time)
    } else {
        elapsed
    }
}

/// Statistics from a recalculation sweep
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecalcStats {
    pub updated: u64,
    /// Plants whose elapsed time has reached their watering time
    pub due: u64,
    pub skipped: u64,
}

/// Spawn the background recalculation task
pub fn spawn_recalc_task(db: DbPool, config: RecalcConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Elapsed-time recalculation is disabled");
        return None;
    }

    let interval_secs = config.interval_minutes.saturating_mul(60);
    tracing::info!(
        interval_minutes = config.interval_minutes,
        cap_at_watering_time = config.cap_at_watering_time,
        "Starting elapsed-time recalculation task"
    );

    let recalculator = ElapsedRecalculator::new(db, config);

    Some(tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            if let Err(e) = recalculator.run_once().await {
                tracing::error!(error = %e, "Elapsed-time sweep failed");
            }
        }
    }))
}
