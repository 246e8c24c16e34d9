use error_notifier::infrastructure::mocks::MockTransport;
use error_notifier::{ErrorReport, Notifier, Report};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn build(transport: MockTransport) -> Notifier {
    Notifier::builder(1, "key")
        .with_transport(Arc::new(transport))
        .build()
        .unwrap()
}

fn spawn_notify(notifier: &Notifier, message: &'static str) -> tokio::task::JoinHandle<error_notifier::Notice> {
    let notifier = notifier.clone();
    tokio::spawn(async move {
        notifier
            .notify(Report::structured(ErrorReport::new("TypeError", message)))
            .await
    })
}

async fn wait_in_flight(notifier: &Notifier) {
    while notifier.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_flush_times_out_on_hanging_delivery() {
    let notifier = build(MockTransport::hanging());
    let pending = spawn_notify(&notifier, "stuck");
    wait_in_flight(&notifier).await;

    let start = Instant::now();
    let flushed = notifier.flush(Duration::from_millis(50)).await;

    assert!(!flushed);
    assert_eq!(start.elapsed(), Duration::from_millis(50));
    // The delivery is not cancelled by the flush
    assert_eq!(notifier.in_flight(), 1);

    pending.abort();
}

#[tokio::test(start_paused = true)]
async fn test_flush_polls_on_fixed_schedule() {
    let transport = MockTransport::new().with_delay(Duration::from_millis(30));
    let notifier = build(transport.clone());
    let pending = spawn_notify(&notifier, "slow");
    wait_in_flight(&notifier).await;

    // 2s budget polls every 20ms: the delivery finishes at 30ms and is
    // observed at the 40ms poll.
    let start = Instant::now();
    assert!(notifier.flush(Duration::from_secs(2)).await);
    assert_eq!(start.elapsed(), Duration::from_millis(40));

    assert_eq!(notifier.in_flight(), 0);
    assert!(pending.await.unwrap().is_delivered());
    assert_eq!(transport.request_count(), 1);
}
