// tests/schedule_times.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use signal_aggregator::pipeline::scheduler::{next_fire_after, parse_cron, Scheduler};

#[test]
fn five_and_six_field_expressions_parse() {
    assert!(parse_cron("0 6,18 * * *").is_ok());
    assert!(parse_cron("*/5 * * * *").is_ok());
    assert!(parse_cron("0 */5 * * * *").is_ok());
    assert!(parse_cron("definitely not cron").is_err());
    assert!(parse_cron("99 99 * * *").is_err());
}

#[test]
fn twice_daily_cron_at_seven_fires_at_eighteen() {
    let now = Utc.with_ymd_and_hms(2025, 8, 5, 7, 0, 0).unwrap();
    let next = next_fire_after("0 6,18 * * *", now).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 8, 5, 18, 0, 0).unwrap());
}

#[test]
fn fire_time_is_strictly_in_the_future() {
    let now = Utc.with_ymd_and_hms(2025, 8, 5, 18, 0, 0).unwrap();
    let next = next_fire_after("0 6,18 * * *", now).unwrap();
    assert!(next > now);
    assert_eq!(next, Utc.with_ymd_and_hms(2025, 8, 6, 6, 0, 0).unwrap());
}

#[tokio::test]
async fn stopping_while_sleeping_prevents_any_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    // Next fire is at most a year away; the loop sleeps immediately.
    let scheduler = Scheduler::start_with("0 0 1 1 *".to_string(), move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_second_cron_actually_runs() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let scheduler = Scheduler::start_with("* * * * * *".to_string(), move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    scheduler.stop().await;
    assert!(runs.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn a_failing_run_does_not_kill_the_loop() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let scheduler = Scheduler::start_with("* * * * * *".to_string(), move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("boom"))
        }
    });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    scheduler.stop().await;
    assert!(runs.load(Ordering::SeqCst) >= 2, "loop should keep going");
}
