use crate::application::ports::{LocalStore, RemoteDocumentStore};
use crate::application::services::{
    AlertScheduler, Backend, EventBus, LedgerSnapshot, LocalGateway, PersistenceGateway,
    RenderReason, SchedulerHandle, SharedTrackerState, SyncCoordinator, SyncState, TickReport,
    TrackerEvent, TrackerState, WriteTarget,
};
use crate::domain::entities::{CartCheckout, LedgerPolicy, ParkingPermit};
use crate::domain::value_objects::{EntryId, ResourceClass, SyncIndicator};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::storage::SqliteLocalStore;
use crate::presentation::dto::{CheckoutRequest, LedgerView, PermitRequest};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// UI ハンドラに渡すアプリケーションコンテキスト。
///
/// 台帳の変更と保存は `write_lock` で直列化し、保存が終わるまで次の変更を受け付けない。
pub struct TrackerContext {
    config: AppConfig,
    state: SharedTrackerState,
    local: Arc<LocalGateway>,
    coordinator: Arc<SyncCoordinator>,
    scheduler: Arc<AlertScheduler>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
    scheduler_handle: Mutex<Option<SchedulerHandle>>,
    resume_task: Mutex<Option<JoinHandle<()>>>,
    pool: Option<ConnectionPool>,
}

impl TrackerContext {
    pub fn new(
        config: AppConfig,
        local_store: Arc<dyn LocalStore>,
        remote_store: Option<Arc<dyn RemoteDocumentStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;

        let state = TrackerState::shared(LedgerPolicy {
            require_student_id: config.policy.require_student_id,
        });
        let events = EventBus::new();
        let local = Arc::new(LocalGateway::new(local_store));
        let write_lock = Arc::new(Mutex::new(()));
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&state),
            Arc::clone(&local),
            remote_store,
            Arc::clone(&clock),
            events.clone(),
        ));
        let scheduler = Arc::new(AlertScheduler::new(
            Arc::clone(&state),
            Arc::clone(&local),
            Arc::clone(&coordinator),
            Arc::clone(&write_lock),
            events.clone(),
            Arc::clone(&clock),
            config.policy,
            Duration::from_secs(config.alerts.dismiss_after_secs),
        )?);

        Ok(Self {
            config,
            state,
            local,
            coordinator,
            scheduler,
            events,
            clock,
            write_lock,
            scheduler_handle: Mutex::new(None),
            resume_task: Mutex::new(None),
            pool: None,
        })
    }

    /// sqlite のローカルストアを開いてコンテキストを作る。
    pub async fn initialize(
        config: AppConfig,
        remote_store: Option<Arc<dyn RemoteDocumentStore>>,
    ) -> Result<Self, AppError> {
        ensure_database_dir(&config.database.url)?;
        let pool =
            ConnectionPool::new(&config.database.url, config.database.max_connections).await?;
        let store = SqliteLocalStore::open(pool.clone()).await?;
        tracing::info!(target: "cart_tracker::startup", url = %config.database.url, "local store ready");

        let mut context = Self::new(config, Arc::new(store), remote_store, Arc::new(SystemClock))?;
        context.pool = Some(pool);
        Ok(context)
    }

    /// ローカル保存分を読み込んで初回描画し、保存済みの共有コードがあれば裏で再接続する。
    pub async fn start(&self) -> Result<(), AppError> {
        let snapshot = self.local.load_all().await?;
        let (carts, permits) = (snapshot.carts.len(), snapshot.permits.len());
        {
            let _guard = self.write_lock.lock().await;
            self.state.write().await.restore(snapshot);
        }
        self.events.render(RenderReason::Initial);
        tracing::info!(target: "cart_tracker::startup", carts, permits, "ledger loaded");

        if self.config.sync.auto_resume && self.local.load_code().await?.is_some() {
            let coordinator = Arc::clone(&self.coordinator);
            let write_lock = Arc::clone(&self.write_lock);
            let task = tokio::spawn(async move {
                let _guard = write_lock.lock().await;
                if let Err(err) = coordinator.resume().await {
                    tracing::error!(target: "cart_tracker::sync", error = %err, "failed to resume shared session");
                }
            });
            if let Some(previous) = self.resume_task.lock().await.replace(task) {
                previous.abort();
            }
        }
        Ok(())
    }

    /// 設定された周期で延滞チェックを始める。二重に起動した場合は前のものを止める。
    pub async fn start_scheduler(&self) {
        let period = Duration::from_secs(self.config.alerts.tick_interval_secs);
        let handle = self.scheduler.spawn(period);
        if let Some(previous) = self.scheduler_handle.lock().await.replace(handle) {
            previous.cancel();
        }
    }

    /// 起動時の再接続が終わるまで待つ。
    pub async fn wait_for_resume(&self) {
        let task = self.resume_task.lock().await.take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::warn!(target: "cart_tracker::sync", error = %err, "resume task ended abnormally");
            }
        }
    }

    pub async fn submit_checkout(&self, request: CheckoutRequest) -> Result<CartCheckout, AppError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();

        let (checkout, snapshot) = {
            let mut state = self.state.write().await;
            let checkout = state
                .ledger
                .add_checkout(&request.number, request.contact(), now)?;
            (checkout, state.snapshot())
        };
        self.persist_carts(&snapshot).await?;

        tracing::info!(target: "cart_tracker::ledger", number = %checkout.number, id = %checkout.id, "cart checked out");
        self.events.render(RenderReason::LedgerChanged);
        Ok(checkout)
    }

    pub async fn submit_permit(&self, request: PermitRequest) -> Result<ParkingPermit, AppError> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();

        let (permit, snapshot) = {
            let mut state = self.state.write().await;
            let permit = state
                .ledger
                .add_permit(&request.license_plate, &request.phone_number, now)?;
            (permit, state.snapshot())
        };
        self.persist_permits(&snapshot).await?;

        tracing::info!(target: "cart_tracker::ledger", plate = %permit.license_plate, id = %permit.id, "parking permit issued");
        self.events.render(RenderReason::LedgerChanged);
        Ok(permit)
    }

    /// 返却。存在しない ID なら何もしない。
    pub async fn check_in(&self, id: &EntryId) -> Result<Option<CartCheckout>, AppError> {
        let _guard = self.write_lock.lock().await;

        let (removed, snapshot) = {
            let mut state = self.state.write().await;
            let removed = state.ledger.remove_checkout(id);
            state.registry.clear(ResourceClass::Cart, id);
            (removed, state.snapshot())
        };
        let Some(removed) = removed else {
            tracing::debug!(target: "cart_tracker::ledger", id = %id, "check-in for unknown cart ignored");
            return Ok(None);
        };
        self.persist_carts(&snapshot).await?;

        tracing::info!(target: "cart_tracker::ledger", number = %removed.number, id = %id, "cart checked in");
        self.events.publish(TrackerEvent::AlertsCleared);
        self.events.render(RenderReason::LedgerChanged);
        Ok(Some(removed))
    }

    pub async fn revoke(&self, id: &EntryId) -> Result<Option<ParkingPermit>, AppError> {
        let _guard = self.write_lock.lock().await;

        let (removed, snapshot) = {
            let mut state = self.state.write().await;
            let removed = state.ledger.remove_permit(id);
            state.registry.clear(ResourceClass::Permit, id);
            (removed, state.snapshot())
        };
        let Some(removed) = removed else {
            tracing::debug!(target: "cart_tracker::ledger", id = %id, "revoke for unknown permit ignored");
            return Ok(None);
        };
        self.persist_permits(&snapshot).await?;

        tracing::info!(target: "cart_tracker::ledger", plate = %removed.license_plate, id = %id, "parking permit revoked");
        self.events.publish(TrackerEvent::AlertsCleared);
        self.events.render(RenderReason::LedgerChanged);
        Ok(Some(removed))
    }

    /// 共有コードを変更する。リモート側の失敗は戻り値の `SyncState::Error` で表す。
    pub async fn set_namespace_code(&self, raw: &str) -> Result<SyncState, AppError> {
        let _guard = self.write_lock.lock().await;
        self.coordinator.set_namespace_code(raw).await
    }

    pub async fn tick(&self) -> Result<TickReport, AppError> {
        self.scheduler.tick().await
    }

    pub async fn snapshot(&self) -> LedgerView {
        let now = self.clock.now();
        let state = self.state.read().await;
        LedgerView::build(
            &state.ledger,
            &self.config.policy,
            self.coordinator.sync_indicator(),
            now,
        )
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn sync_state(&self) -> SyncState {
        self.coordinator.sync_state()
    }

    /// 動作モードの変化を購読する。接続中の `Connecting` も観測できる。
    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.coordinator.watch_state()
    }

    pub fn sync_indicator(&self) -> SyncIndicator {
        self.coordinator.sync_indicator()
    }

    pub async fn has_active_subscription(&self) -> bool {
        self.coordinator.has_active_subscription().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn shutdown(&self) {
        if let Some(handle) = self.scheduler_handle.lock().await.take() {
            handle.stop().await;
        }
        if let Some(task) = self.resume_task.lock().await.take() {
            task.abort();
        }
        self.scheduler.shutdown();
        self.coordinator.shutdown().await;
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        tracing::info!(target: "cart_tracker::startup", "tracker context shut down");
    }

    /// オンライン中はリモートへ、それ以外はローカルへカートを保存する。
    /// リモートの失敗は同期表示に回し、台帳は戻さない。
    async fn persist_carts(&self, snapshot: &LedgerSnapshot) -> Result<(), AppError> {
        let gateway = match self.coordinator.write_target().await {
            WriteTarget::Local => Arc::clone(&self.local) as Arc<dyn PersistenceGateway>,
            WriteTarget::Remote(remote) => remote as Arc<dyn PersistenceGateway>,
        };
        match gateway.save(snapshot).await {
            Ok(()) => {
                if gateway.backend() == Backend::Remote {
                    self.coordinator.report_remote_success();
                }
                Ok(())
            }
            // リモートの失敗は表示に出すだけで台帳は保持する
            Err(AppError::Sync(err)) => {
                self.coordinator.report_remote_failure(&err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn persist_permits(&self, snapshot: &LedgerSnapshot) -> Result<(), AppError> {
        self.local
            .save_permits(&snapshot.permits, &snapshot.alerted_permits)
            .await?;
        Ok(())
    }
}

fn ensure_database_dir(url: &str) -> Result<(), AppError> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                AppError::ConfigurationError(format!(
                    "Failed to create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryLocalStore;
    use crate::shared::clock::ManualClock;
    use crate::shared::error::LedgerError;
    use chrono::{TimeZone, Utc};

    fn context() -> TrackerContext {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap());
        TrackerContext::new(
            AppConfig::default(),
            Arc::new(MemoryLocalStore::new()),
            None,
            Arc::new(clock),
        )
        .unwrap()
    }

    fn checkout(number: &str) -> CheckoutRequest {
        CheckoutRequest {
            number: number.to_string(),
            student_id: Some("S100".to_string()),
            phone_number: "555-0100".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_checkout_returns_ledger_error() {
        let ctx = context();
        ctx.submit_checkout(checkout("7")).await.unwrap();

        let err = ctx.submit_checkout(checkout("7")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Ledger(LedgerError::Duplicate { .. })
        ));
        assert_eq!(ctx.snapshot().await.carts.len(), 1);
    }

    #[tokio::test]
    async fn check_in_clears_alerts_and_is_idempotent() {
        let ctx = context();
        let cart = ctx.submit_checkout(checkout("3")).await.unwrap();
        let mut events = ctx.subscribe_events();

        assert!(ctx.check_in(&cart.id).await.unwrap().is_some());
        assert_eq!(events.recv().await.unwrap(), TrackerEvent::AlertsCleared);
        assert!(ctx.check_in(&cart.id).await.unwrap().is_none());
        assert!(ctx.snapshot().await.carts.is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.policy.cart_limit_minutes = 0;
        let result = TrackerContext::new(
            config,
            Arc::new(MemoryLocalStore::new()),
            None,
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[test]
    fn ensure_database_dir_skips_memory_urls() {
        assert!(ensure_database_dir("sqlite::memory:").is_ok());
        assert!(ensure_database_dir("sqlite://:memory:").is_ok());
    }
}
