use chrono::{Duration as ChronoDuration, Local};
use ms_core::{ApiError, TimerHandler, UnitDomain};
use ms_scheduler::{RecurrenceRule, ScheduleOptions, SchedulePattern, TimeScheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting_handler() -> (TimerHandler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let handler: TimerHandler = Arc::new(move || -> anyhow::Result<()> {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (handler, count)
}

#[tokio::test]
async fn one_shot_date_fires_once() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("once");
    let (handler, count) = counting_handler();

    let at = Local::now() + ChronoDuration::milliseconds(100);
    let handles = scheduler
        .schedule(&domain, at, ScheduleOptions::default(), handler)
        .unwrap();
    assert_eq!(handles.len(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(handles[0].is_finished());
    assert_eq!(scheduler.active_jobs(), 0);
}

#[tokio::test]
async fn past_date_never_fires() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("past");
    let (handler, count) = counting_handler();

    let at = Local::now() - ChronoDuration::seconds(10);
    scheduler
        .schedule(&domain, at, ScheduleOptions::default(), handler)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_job_does_not_fire() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("cancel");
    let (handler, count) = counting_handler();

    let at = Local::now() + ChronoDuration::milliseconds(200);
    let handles = scheduler
        .schedule(&domain, at, ScheduleOptions::default(), handler)
        .unwrap();
    handles[0].cancel();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_second_cron_fires() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("tick");
    let (handler, count) = counting_handler();

    scheduler
        .schedule(&domain, "* * * * * *", ScheduleOptions::default(), handler)
        .unwrap();
    assert_eq!(scheduler.active_jobs(), 1);

    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert!(count.load(Ordering::SeqCst) >= 1);

    scheduler.shutdown();
    assert_eq!(scheduler.active_jobs(), 0);
}

#[tokio::test]
async fn jitter_delays_but_fires() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("jitter");
    let (handler, count) = counting_handler();

    let at = Local::now() + ChronoDuration::milliseconds(50);
    scheduler
        .schedule(&domain, at, ScheduleOptions::random(0.2), handler)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_error_is_contained() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("broken");
    let handler: TimerHandler = Arc::new(|| -> anyhow::Result<()> {
        anyhow::bail!("lamp unreachable")
    });

    let at = Local::now() + ChronoDuration::milliseconds(50);
    scheduler
        .schedule(&domain, at, ScheduleOptions::default(), handler)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(domain.error_count(), 1);
}

#[tokio::test]
async fn invalid_arguments_fail_synchronously() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("args");
    let (handler, _) = counting_handler();

    let err = scheduler
        .schedule(
            &domain,
            vec!["0 * * * *", "not a cron"],
            ScheduleOptions::default(),
            handler.clone(),
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidPattern { ref pattern, .. } if pattern == "not a cron"));
    assert_eq!(scheduler.active_jobs(), 0);

    let err = scheduler
        .schedule(
            &domain,
            Vec::<SchedulePattern>::new(),
            ScheduleOptions::default(),
            handler.clone(),
        )
        .unwrap_err();
    assert_eq!(err, ApiError::PatternMissing);

    let err = scheduler
        .schedule(
            &domain,
            RecurrenceRule::new().hour(7),
            ScheduleOptions::random(-5.0),
            handler,
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidDelay { option: "random", .. }));
}

#[tokio::test]
async fn pattern_list_fans_out() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("multi");
    let (handler, _) = counting_handler();

    let handles = scheduler
        .schedule(
            &domain,
            vec![
                SchedulePattern::from("0 7 * * *"),
                SchedulePattern::Rule(RecurrenceRule::new().hour(19).minute(0)),
            ],
            ScheduleOptions::default(),
            handler,
        )
        .unwrap();
    assert_eq!(handles.len(), 2);
    assert_eq!(scheduler.active_jobs(), 2);
    scheduler.shutdown();
}

#[tokio::test]
async fn unrepresentable_jitter_is_reported_by_the_unit() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("huge-random");
    let (handler, count) = counting_handler();

    let at = Local::now() + ChronoDuration::milliseconds(50);
    scheduler
        .schedule(&domain, at, ScheduleOptions::random(1e300), handler)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(domain.error_count(), 1);
}

#[tokio::test]
async fn recurring_job_survives_unrepresentable_jitter() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("huge-random");
    let (handler, _) = counting_handler();

    let handles = scheduler
        .schedule(&domain, "* * * * * *", ScheduleOptions::random(1e300), handler)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert!(domain.error_count() >= 1);
    assert!(!handles[0].is_finished());
    scheduler.shutdown();
}

#[tokio::test]
async fn finished_jobs_are_dropped() {
    let scheduler = TimeScheduler::new();
    let domain = UnitDomain::new("housekeeping");
    let (handler, count) = counting_handler();

    scheduler
        .schedule(
            &domain,
            Local::now() - ChronoDuration::seconds(10),
            ScheduleOptions::default(),
            handler.clone(),
        )
        .unwrap();
    assert_eq!(scheduler.tracked_jobs(), 0);

    scheduler
        .schedule(
            &domain,
            Local::now() + ChronoDuration::milliseconds(50),
            ScheduleOptions::default(),
            handler.clone(),
        )
        .unwrap();
    assert_eq!(scheduler.tracked_jobs(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    scheduler
        .schedule(&domain, "0 7 * * *", ScheduleOptions::default(), handler)
        .unwrap();
    assert_eq!(scheduler.tracked_jobs(), 1);
    scheduler.shutdown();
}
