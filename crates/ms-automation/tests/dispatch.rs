//! Dispatch timing and filtering, driven with a paused clock

use ms_automation::{Dispatcher, SubscribeOptions};
use ms_core::{HandlerResult, InboundMessage, TopicEvent, TopicHandler, UnitDomain};
use ms_state_store::TopicStateStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn handler(f: impl Fn(TopicEvent) -> HandlerResult + Send + Sync + 'static) -> TopicHandler {
    Arc::new(f)
}

fn counter() -> (Arc<AtomicUsize>, TopicHandler) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let h = handler(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (count, h)
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(TopicStateStore::new()))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_shift_delays_handler() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("shift");
    let (count, h) = counter();
    dispatcher
        .subscribe(&domain, "a", SubscribeOptions::new().shift(2.0), h)
        .unwrap();

    dispatcher.dispatch(InboundMessage::new("a", "1", false));
    tokio::time::sleep(Duration::from_millis(1999)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_undelayed_handler_runs_while_shifted_one_waits() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("ordering");
    let order = Arc::new(Mutex::new(Vec::new()));
    let late = order.clone();
    let early = order.clone();
    dispatcher
        .subscribe(
            &domain,
            "a",
            SubscribeOptions::new().shift(2.0),
            handler(move |_| {
                late.lock().unwrap().push("shifted");
                Ok(())
            }),
        )
        .unwrap();
    dispatcher
        .subscribe(
            &domain,
            "a",
            SubscribeOptions::new(),
            handler(move |_| {
                early.lock().unwrap().push("immediate");
                Ok(())
            }),
        )
        .unwrap();

    dispatcher.dispatch(InboundMessage::new("a", "1", false));
    settle().await;
    assert_eq!(*order.lock().unwrap(), vec!["immediate"]);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(*order.lock().unwrap(), vec!["immediate", "shifted"]);
}

#[tokio::test(start_paused = true)]
async fn test_random_delay_stays_within_bounds() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("random");
    let start = Instant::now();
    let delays = Arc::new(Mutex::new(Vec::new()));
    let sink = delays.clone();
    dispatcher
        .subscribe(
            &domain,
            "a",
            SubscribeOptions::new().shift(1.0).random(1.0),
            handler(move |_| {
                sink.lock().unwrap().push(start.elapsed());
                Ok(())
            }),
        )
        .unwrap();

    for _ in 0..20 {
        dispatcher.dispatch(InboundMessage::new("a", "1", false));
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    let delays = delays.lock().unwrap();
    assert_eq!(delays.len(), 20);
    for delay in delays.iter() {
        assert!(*delay >= Duration::from_secs(1), "{:?}", delay);
        assert!(*delay < Duration::from_secs(2), "{:?}", delay);
    }
}

#[tokio::test(start_paused = true)]
async fn test_change_suppresses_repeats() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("change");
    let (count, h) = counter();
    dispatcher
        .subscribe(&domain, "c", SubscribeOptions::new().change(), h)
        .unwrap();

    for payload in ["0", "0", "0", "1", "1"] {
        dispatcher.dispatch(InboundMessage::new("c", payload, false));
    }
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_change_compares_objects_by_content() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("change");
    let (count, h) = counter();
    dispatcher
        .subscribe(&domain, "o", SubscribeOptions::new().change(), h)
        .unwrap();

    for payload in [
        r#"{"on":true,"level":1}"#,
        r#"{"level":1.0,"on":true}"#,
        r#"{"on":true,"level":2}"#,
        r#"{"on":true,"level":2}"#,
    ] {
        dispatcher.dispatch(InboundMessage::new("o", payload, false));
    }
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_handler_receives_old_value() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("old");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    dispatcher
        .subscribe(
            &domain,
            "sensor/+",
            SubscribeOptions::new(),
            handler(move |event| {
                sink.lock()
                    .unwrap()
                    .push((event.topic, event.value.to_string(), event.old_value.map(|v| v.to_string())));
                Ok(())
            }),
        )
        .unwrap();

    dispatcher.dispatch(InboundMessage::new("sensor/t", "20", false));
    settle().await;
    dispatcher.dispatch(InboundMessage::new("sensor/t", "on", false));
    settle().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("sensor/t".to_string(), "20".to_string(), None),
            ("sensor/t".to_string(), "on".to_string(), Some("20".to_string())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_condition_expression_filters() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("condition");
    let (count, h) = counter();
    dispatcher
        .subscribe(
            &domain,
            "temp",
            SubscribeOptions::new().condition("state > 20 and (oldState is none or oldState <= 20)"),
            h,
        )
        .unwrap();

    for payload in ["19", "21", "22", "18", "25"] {
        dispatcher.dispatch(InboundMessage::new("temp", payload, false));
    }
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_condition_predicate_filters() {
    let dispatcher = dispatcher();
    let domain = UnitDomain::new("predicate");
    let (count, h) = counter();
    dispatcher
        .subscribe(
            &domain,
            "#",
            SubscribeOptions::new().when(|event| event.topic.starts_with("keep/")),
            h,
        )
        .unwrap();

    dispatcher.dispatch(InboundMessage::new("keep/a", "1", false));
    dispatcher.dispatch(InboundMessage::new("drop/a", "1", false));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_unit_does_not_affect_others() {
    let dispatcher = dispatcher();
    let faulty = UnitDomain::new("faulty");
    let healthy = UnitDomain::new("healthy");

    dispatcher
        .subscribe(
            &faulty,
            "x",
            SubscribeOptions::new(),
            handler(|_| anyhow::bail!("handler failed")),
        )
        .unwrap();
    dispatcher
        .subscribe(
            &faulty,
            "x",
            SubscribeOptions::new(),
            handler(|_| panic!("handler panicked")),
        )
        .unwrap();
    let (count, h) = counter();
    dispatcher
        .subscribe(&healthy, "x", SubscribeOptions::new(), h)
        .unwrap();

    for _ in 0..3 {
        assert_eq!(dispatcher.dispatch(InboundMessage::new("x", "1", false)), 3);
    }
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(faulty.error_count(), 6);
    assert_eq!(healthy.error_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_from_handler() {
    let dispatcher = Arc::new(dispatcher());
    let domain = UnitDomain::new("nested");
    let (count, inner) = counter();

    let d = dispatcher.clone();
    let dom = domain.clone();
    dispatcher
        .subscribe(
            &domain,
            "outer",
            SubscribeOptions::new(),
            handler(move |_| {
                d.subscribe(&dom, "inner", SubscribeOptions::new(), inner.clone())?;
                Ok(())
            }),
        )
        .unwrap();

    dispatcher.dispatch(InboundMessage::new("outer", "1", false));
    settle().await;
    assert_eq!(dispatcher.subscription_count(), 2);

    dispatcher.dispatch(InboundMessage::new("inner", "1", false));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
