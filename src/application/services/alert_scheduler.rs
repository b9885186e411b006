use super::events::{EventBus, RenderReason, TrackerEvent};
use super::persistence_gateway::{LedgerSnapshot, LocalGateway};
use super::sync_coordinator::{SyncCoordinator, WriteTarget};
use super::tracker_state::{SharedTrackerState, TrackerState};
use crate::domain::entities::Alert;
use crate::domain::time_math;
use crate::domain::value_objects::ResourceClass;
use crate::shared::clock::Clock;
use crate::shared::config::PolicyConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 1 回の評価結果。
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub alerts: Vec<Alert>,
    pub evaluated: usize,
}

/// 延滞チェックを周期的に実行する。
///
/// `tick` は単体で呼べる決定的な処理で、`spawn` はそれを一定間隔で回すだけ。
pub struct AlertScheduler {
    state: SharedTrackerState,
    local: Arc<LocalGateway>,
    coordinator: Arc<SyncCoordinator>,
    write_lock: Arc<Mutex<()>>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    policy: PolicyConfig,
    dismiss_after: Duration,
    dismiss_after_delta: chrono::Duration,
    shutdown: CancellationToken,
}

impl AlertScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedTrackerState,
        local: Arc<LocalGateway>,
        coordinator: Arc<SyncCoordinator>,
        write_lock: Arc<Mutex<()>>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        policy: PolicyConfig,
        dismiss_after: Duration,
    ) -> Result<Self, AppError> {
        let dismiss_after_delta = chrono::Duration::from_std(dismiss_after)
            .map_err(|err| AppError::ConfigurationError(err.to_string()))?;
        Ok(Self {
            state,
            local,
            coordinator,
            write_lock,
            events,
            clock,
            policy,
            dismiss_after,
            dismiss_after_delta,
            shutdown: CancellationToken::new(),
        })
    }

    /// 全エントリを評価し、新たに延滞したものだけ警告を出す。
    pub async fn tick(&self) -> Result<TickReport, AppError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();

        let (alerts, evaluated, snapshot) = {
            let mut guard = self.state.write().await;
            let TrackerState { ledger, registry } = &mut *guard;
            let mut alerts = Vec::new();

            let cart_limit = self.policy.limit_minutes(ResourceClass::Cart);
            for cart in ledger.checkouts() {
                let overdue = time_math::is_overdue(cart.checkout_time, cart_limit, now);
                if registry.should_alert(ResourceClass::Cart, &cart.id, overdue) {
                    alerts.push(Alert::for_cart(cart, now, self.dismiss_after_delta));
                }
            }

            let permit_limit = self.policy.limit_minutes(ResourceClass::Permit);
            for permit in ledger.permits() {
                let overdue = time_math::is_overdue(permit.issue_time, permit_limit, now);
                if registry.should_alert(ResourceClass::Permit, &permit.id, overdue) {
                    alerts.push(Alert::for_permit(permit, now, self.dismiss_after_delta));
                }
            }

            let evaluated = ledger.checkouts().len() + ledger.permits().len();
            (alerts, evaluated, LedgerSnapshot::capture(ledger, registry))
        };

        if !alerts.is_empty() {
            self.persist_markers(&alerts, &snapshot).await?;
        }

        for alert in &alerts {
            tracing::info!(
                target: "cart_tracker::alerts",
                class = %alert.class,
                label = %alert.label,
                elapsed = %alert.elapsed,
                "overdue alert raised"
            );
            self.events.publish(TrackerEvent::Alert {
                alert: alert.clone(),
            });
            self.schedule_dismiss(alert);
        }
        self.events.render(RenderReason::Tick);

        Ok(TickReport { alerts, evaluated })
    }

    /// `period` ごとに `tick` を回す。最初の評価は 1 周期後。
    pub fn spawn(self: &Arc<Self>, period: Duration) -> SchedulerHandle {
        let period = period.max(Duration::from_millis(1));
        let token = self.shutdown.child_token();
        let loop_token = token.clone();
        let scheduler = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(err) = scheduler.tick().await {
                            tracing::error!(target: "cart_tracker::alerts", error = %err, "overdue check failed");
                        }
                    }
                }
            }
            tracing::debug!(target: "cart_tracker::alerts", "alert scheduler stopped");
        });

        tracing::debug!(
            target: "cart_tracker::alerts",
            period_ms = period.as_millis() as u64,
            "alert scheduler started"
        );
        SchedulerHandle {
            token,
            task: Some(task),
        }
    }

    /// 周期実行と保留中の自動消去タイマーをすべて止める。
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn persist_markers(
        &self,
        alerts: &[Alert],
        snapshot: &LedgerSnapshot,
    ) -> Result<(), AppError> {
        let fired = |class: ResourceClass| alerts.iter().any(|alert| alert.class == class);

        match self.coordinator.write_target().await {
            WriteTarget::Local => self.local.save_all(snapshot).await?,
            // オンライン中のカート一覧はリモートが正。ローカルにはマーカーだけ残す
            WriteTarget::Remote(_) => {
                if fired(ResourceClass::Cart) {
                    self.local.merge_cart_markers(&snapshot.alerted_carts).await?;
                }
                if fired(ResourceClass::Permit) {
                    self.local
                        .save_permits(&snapshot.permits, &snapshot.alerted_permits)
                        .await?;
                }
            }
        }
        Ok(())
    }

    fn schedule_dismiss(&self, alert: &Alert) {
        let events = self.events.clone();
        let token = self.shutdown.child_token();
        let delay = self.dismiss_after;
        let alert_id = alert.id.clone();
        let entry_id = alert.entry_id.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    events.publish(TrackerEvent::AlertDismissed { alert_id, entry_id });
                }
            }
        });
    }
}

/// `spawn` の戻り値。破棄または `cancel` で周期実行が止まる。
pub struct SchedulerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 停止してループの終了を待つ。
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(target: "cart_tracker::alerts", error = %err, "alert scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::persistence_gateway::ALERTED_PERMITS_KEY;
    use crate::application::ports::LocalStore;
    use crate::domain::entities::{CheckoutContact, LedgerPolicy};
    use crate::infrastructure::storage::MemoryLocalStore;
    use crate::shared::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        state: SharedTrackerState,
        store: Arc<MemoryLocalStore>,
        clock: ManualClock,
        events: EventBus,
        scheduler: Arc<AlertScheduler>,
    }

    fn fixture() -> Fixture {
        let state = TrackerState::shared(LedgerPolicy::default());
        let store = Arc::new(MemoryLocalStore::new());
        let local = Arc::new(LocalGateway::new(store.clone()));
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap());
        let events = EventBus::new();
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&state),
            Arc::clone(&local),
            None,
            Arc::new(clock.clone()),
            events.clone(),
        ));
        let scheduler = AlertScheduler::new(
            Arc::clone(&state),
            local,
            coordinator,
            Arc::new(Mutex::new(())),
            events.clone(),
            Arc::new(clock.clone()),
            PolicyConfig::default(),
            Duration::from_secs(10),
        )
        .unwrap();
        Fixture {
            state,
            store,
            clock,
            events,
            scheduler: Arc::new(scheduler),
        }
    }

    #[tokio::test]
    async fn overdue_cart_alerts_exactly_once() {
        let fx = fixture();
        {
            let mut state = fx.state.write().await;
            state
                .ledger
                .add_checkout("4", CheckoutContact::new(Some("S".into()), "555"), fx.clock.now())
                .unwrap();
        }

        fx.clock.advance_minutes(29);
        assert!(fx.scheduler.tick().await.unwrap().alerts.is_empty());

        fx.clock.advance_minutes(2);
        let report = fx.scheduler.tick().await.unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].label, "Cart #4");
        assert_eq!(report.evaluated, 1);

        fx.clock.advance_minutes(10);
        assert!(fx.scheduler.tick().await.unwrap().alerts.is_empty());
    }

    #[tokio::test]
    async fn permit_markers_are_persisted_when_alert_fires() {
        let fx = fixture();
        {
            let mut state = fx.state.write().await;
            state
                .ledger
                .add_permit("abc123", "555", fx.clock.now())
                .unwrap();
        }

        fx.clock.advance_minutes(15);
        let report = fx.scheduler.tick().await.unwrap();
        assert_eq!(report.alerts.len(), 1);

        let raw = fx.store.get(ALERTED_PERMITS_KEY).await.unwrap().unwrap();
        assert!(raw.contains(report.alerts[0].entry_id.as_str()));
    }

    #[tokio::test]
    async fn tick_always_emits_render() {
        let fx = fixture();
        let mut events = fx.events.subscribe();

        fx.scheduler.tick().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            TrackerEvent::Render {
                reason: RenderReason::Tick
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_are_dismissed_after_delay() {
        let fx = fixture();
        {
            let mut state = fx.state.write().await;
            state
                .ledger
                .add_permit("zz9", "555", fx.clock.now())
                .unwrap();
        }
        let mut events = fx.events.subscribe();

        fx.clock.advance_minutes(20);
        let report = fx.scheduler.tick().await.unwrap();
        let alert_id = report.alerts[0].id.clone();

        assert!(matches!(events.recv().await.unwrap(), TrackerEvent::Alert { .. }));
        assert!(matches!(events.recv().await.unwrap(), TrackerEvent::Render { .. }));

        tokio::time::sleep(Duration::from_secs(11)).await;
        match events.recv().await.unwrap() {
            TrackerEvent::AlertDismissed { alert_id: dismissed, .. } => {
                assert_eq!(dismissed, alert_id)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_handle_stops_ticking() {
        let fx = fixture();
        let mut events = fx.events.subscribe();
        let handle = fx.scheduler.spawn(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(matches!(events.recv().await.unwrap(), TrackerEvent::Render { .. }));

        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        handle.stop().await;

        tokio::time::sleep(Duration::from_secs(180)).await;
        assert!(events.try_recv().is_err());
    }
}
