use error_notifier::infrastructure::mocks::{MockClock, MockTransport};
use error_notifier::{ClientPlatform, ErrorReport, Notifier, NotifyError, Report};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

fn build(transport: &MockTransport) -> Notifier {
    Notifier::builder(1, "key")
        .with_transport(Arc::new(transport.clone()))
        .with_clock(Arc::new(MockClock::new(Instant::now())))
        .with_platform(Arc::new(ClientPlatform::new()))
        .build()
        .unwrap()
}

fn report(n: usize) -> Report {
    Report::structured(ErrorReport::new("TypeError", format!("error {}", n)))
}

/// Spawn a notify call and wait until it is parked.
async fn park(notifier: &Notifier, n: usize) -> JoinHandle<error_notifier::Notice> {
    let parked = notifier.metrics().notices_queued();
    let task = {
        let notifier = notifier.clone();
        tokio::spawn(async move { notifier.notify(report(n)).await })
    };
    while notifier.metrics().notices_queued() == parked {
        tokio::task::yield_now().await;
    }
    task
}

#[tokio::test]
async fn test_offline_notices_are_parked_and_replayed_in_order() {
    let transport = MockTransport::new();
    let notifier = build(&transport);
    notifier.on_offline();
    assert!(notifier.is_offline());

    let mut tasks = Vec::new();
    for n in 0..3 {
        tasks.push(park(&notifier, n).await);
    }
    assert_eq!(notifier.queued(), 3);
    assert_eq!(notifier.in_flight(), 0);
    assert_eq!(transport.request_count(), 0);

    notifier.on_online().await;
    assert!(!notifier.is_offline());
    assert_eq!(notifier.queued(), 0);

    for task in tasks {
        assert!(task.await.unwrap().is_delivered());
    }
    let messages: Vec<_> = transport
        .notices()
        .iter()
        .map(|notice| notice["errors"][0]["message"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(messages, vec!["error 0", "error 1", "error 2"]);
}

#[tokio::test]
async fn test_offline_queue_overflow_evicts_oldest() {
    let transport = MockTransport::new();
    let notifier = build(&transport);
    notifier.on_offline();

    let mut tasks = Vec::new();
    for n in 0..101 {
        tasks.push(park(&notifier, n).await);
    }
    assert_eq!(notifier.queued(), 100);
    assert_eq!(notifier.metrics().notices_evicted(), 1);

    let mut tasks = tasks.into_iter();
    let oldest = tasks.next().unwrap().await.unwrap();
    assert_eq!(oldest.error, Some(NotifyError::QueueOverflow));

    notifier.on_online().await;
    for task in tasks {
        assert!(task.await.unwrap().is_delivered());
    }

    let notices = transport.notices();
    assert_eq!(notices.len(), 100);
    assert_eq!(notices[0]["errors"][0]["message"], "error 1");
    assert_eq!(notices[99]["errors"][0]["message"], "error 100");
}

#[tokio::test]
async fn test_repeated_offline_and_online_calls_are_idempotent() {
    let transport = MockTransport::new();
    let notifier = build(&transport);

    notifier.on_online().await;
    notifier.on_offline();
    notifier.on_offline();
    let task = park(&notifier, 0).await;

    notifier.on_online().await;
    notifier.on_online().await;
    assert!(task.await.unwrap().is_delivered());
    assert_eq!(transport.request_count(), 1);
}
