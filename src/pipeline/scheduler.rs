// src/pipeline/scheduler.rs
//! Cron-driven scheduler: one long-lived loop that sleeps until the next
//! cron fire time, then runs the pipeline with trigger `scheduled`.
//!
//! Stop interrupts a pending sleep immediately, but a pipeline run already
//! in flight always runs to completion; only the sleep is cancellable.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{Pipeline, Trigger};

/// Backoff after an internal scheduler error (e.g. malformed cron).
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Owned handle for the scheduler loop. Construct with [`Scheduler::start`],
/// tear down with [`Scheduler::stop`] (before closing the pool).
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(pipeline: Arc<Pipeline>, cron_expression: String) -> Self {
        info!(cron = %cron_expression, "scheduler started");
        Self::start_with(cron_expression, move || {
            let pipeline = pipeline.clone();
            async move { pipeline.run(Trigger::Scheduled).await.map(|_| ()) }
        })
    }

    /// Start the loop with an arbitrary run closure.
    pub fn start_with<F, Fut>(cron_expression: String, run: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(cron_loop(cron_expression, run, rx));
        Self { shutdown, handle }
    }

    /// Stop the loop: interrupts a pending sleep, waits for the loop task
    /// (and with it any in-flight run) to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
        info!("scheduler stopped");
    }
}

async fn cron_loop<F, Fut>(cron_expression: String, mut run: F, mut shutdown: watch::Receiver<bool>)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    loop {
        if *shutdown.borrow() {
            break;
        }

        let now = Utc::now();
        let delay = match next_fire_after(&cron_expression, now) {
            Ok(next_run) => {
                let delay = (next_run - now).to_std().unwrap_or(Duration::ZERO);
                info!(
                    next_run = %next_run,
                    delay_secs = delay.as_secs(),
                    "next pipeline run scheduled"
                );
                delay
            }
            Err(e) => {
                warn!(error = %e, "scheduler loop error, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(ERROR_BACKOFF) => continue,
                    _ = shutdown.changed() => break,
                }
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                if *shutdown.borrow() {
                    break;
                }
                // The run itself is not cancellable; stop() waits for it.
                if let Err(e) = run().await {
                    error!(error = %e, "scheduled pipeline run failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// The next cron fire time strictly after `now`.
pub fn next_fire_after(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let schedule = parse_cron(expr)?;
    schedule
        .after(&now)
        .next()
        .context("cron schedule yields no future fire time")
}

/// Parse a cron expression, auto-prepending a seconds field for standard
/// 5-field expressions (the `cron` crate wants 6 or 7 fields).
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    let normalized = if parts.len() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).with_context(|| format!("invalid cron expression: {expr}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_cron_is_auto_prefixed() {
        assert!(parse_cron("0 6,18 * * *").is_ok());
        assert!(parse_cron("0 */5 * * * *").is_ok());
        assert!(parse_cron("not a cron").is_err());
    }

    #[test]
    fn next_fire_is_strictly_after_now() {
        let now = Utc.with_ymd_and_hms(2025, 8, 5, 6, 0, 0).unwrap();
        let next = next_fire_after("0 6,18 * * *", now).unwrap();
        // 06:00:00 itself does not count; the next slot is 18:00.
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 8, 5, 18, 0, 0).unwrap());
    }

    #[test]
    fn twice_daily_schedule_picks_evening_slot() {
        let now = Utc.with_ymd_and_hms(2025, 8, 5, 7, 0, 0).unwrap();
        let next = next_fire_after("0 6,18 * * *", now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 8, 5, 18, 0, 0).unwrap());
    }

    #[test]
    fn rolls_over_to_next_morning() {
        let now = Utc.with_ymd_and_hms(2025, 8, 5, 19, 30, 0).unwrap();
        let next = next_fire_after("0 6,18 * * *", now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 8, 6, 6, 0, 0).unwrap());
    }
}
