//! Basic example: report errors with context and log breadcrumbs.
//!
//! Uses the mock transport so it runs without a collector. Swap in
//! `ReqwestTransport` (feature `reqwest-transport`) to deliver for real.

use error_notifier::infrastructure::mocks::MockTransport;
use error_notifier::{ErrorReport, HistoryLayer, Notice, Notifier, Report};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transport = MockTransport::new();
    let notifier = Notifier::builder(1, "demo-key")
        .with_environment("development")
        .with_transport(Arc::new(transport.clone()))
        .build()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(HistoryLayer::new(notifier.clone()))
        .init();

    println!("=== Basic Error Reporting Example ===\n");

    notifier.set_context_value("component", "checkout");
    notifier.add_filter(|mut notice: Notice| {
        notice.context.insert("demo".to_string(), true.into());
        Some(notice)
    });

    info!(user = "alice", "cart loaded");
    warn!(retries = 3, "payment gateway slow");

    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "payment gateway timed out");
    let notice = notifier
        .notify(
            Report::new(err)
                .with_param("order", 1042)
                .with_param("card_secret", "4111-1111"),
        )
        .await;
    println!("first notice: id={:?} error={:?}", notice.id, notice.error);

    // An immediate repeat is debounced
    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "payment gateway timed out");
    let repeat = notifier.notify(err).await;
    println!("repeat filtered: {}", repeat.is_filtered());

    // Structured errors skip the processor
    let structured = notifier
        .notify(Report::structured(ErrorReport::new(
            "Error",
            "Uncaught RangeError: quantity out of range",
        )))
        .await;
    println!("structured notice: id={:?}", structured.id);

    notifier.flush(Duration::from_secs(1)).await;

    println!("\nPayloads sent:");
    for payload in transport.notices() {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    let snapshot = notifier.metrics().snapshot();
    println!(
        "\nsent: {}, filtered: {}, failed: {}",
        snapshot.notices_sent, snapshot.notices_filtered, snapshot.notices_failed
    );
    println!("\n=== Example Complete ===");
    Ok(())
}
