use cart_tracker::application::ports::{LocalStore, RemoteDocumentStore};
use cart_tracker::presentation::dto::{CheckoutRequest, PermitRequest};
use cart_tracker::shared::clock::ManualClock;
use cart_tracker::shared::config::AppConfig;
use cart_tracker::state::TrackerContext;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

pub fn manual_clock() -> ManualClock {
    ManualClock::new(start_time())
}

pub fn context_with(
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteDocumentStore>>,
    clock: &ManualClock,
) -> TrackerContext {
    TrackerContext::new(AppConfig::default(), local, remote, Arc::new(clock.clone())).unwrap()
}

pub fn checkout(number: &str) -> CheckoutRequest {
    CheckoutRequest {
        number: number.to_string(),
        student_id: Some(format!("S{number}")),
        phone_number: "555-0100".to_string(),
    }
}

pub fn permit(plate: &str) -> PermitRequest {
    PermitRequest {
        license_plate: plate.to_string(),
        phone_number: "555-0200".to_string(),
    }
}

pub async fn cart_numbers(context: &TrackerContext) -> Vec<String> {
    context
        .snapshot()
        .await
        .carts
        .into_iter()
        .map(|row| row.number)
        .collect()
}

/// リモート更新が反映されるまで待つ。
pub async fn wait_for_carts(context: &TrackerContext, expected: &[&str]) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if cart_numbers(context).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "carts never became {expected:?}, last seen {:?}",
        cart_numbers(context).await
    );
}
