pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod state;

use application::services::TrackerEvent;
use shared::config::AppConfig;
use state::TrackerContext;
use tokio::sync::broadcast;
use tracing::info;

/// ヘッドレスで起動し、Ctrl-C まで延滞チェックとイベントの記録を続ける。
pub async fn run() -> anyhow::Result<()> {
    // ログ設定の初期化
    init_logging();

    info!("Cart tracker starting...");

    let config = AppConfig::from_env();
    let context = TrackerContext::initialize(config, None).await?;
    let mut events = context.subscribe_events();

    context.start().await?;
    context.start_scheduler().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "cart_tracker::events", skipped, "event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    context.shutdown().await;
    Ok(())
}

fn log_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::Alert { alert } => {
            tracing::warn!(target: "cart_tracker::alerts", "{}: {}", alert.title(), alert.message());
        }
        TrackerEvent::SyncStatusChanged { indicator } => {
            info!(target: "cart_tracker::sync", status = indicator.as_str(), "{indicator}");
        }
        other => {
            tracing::trace!(target: "cart_tracker::events", event = ?other, "event");
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cart_tracker=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
