use super::events::{EventBus, RenderReason, TrackerEvent};
use super::persistence_gateway::{LocalGateway, PersistenceGateway, RemoteGateway};
use super::tracker_state::SharedTrackerState;
use crate::application::ports::{LocationDocument, RemoteDocumentStore, RemoteSubscription};
use crate::domain::value_objects::{NamespaceCode, SyncIndicator};
use crate::shared::clock::Clock;
use crate::shared::error::{AppError, SyncError};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REMOTE_UNAVAILABLE: &str = "Remote store not available";

/// ローカル / オンラインの動作モード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Local,
    Connecting(NamespaceCode),
    Online(NamespaceCode),
    Error { code: NamespaceCode, message: String },
}

impl SyncState {
    pub fn code(&self) -> Option<&NamespaceCode> {
        match self {
            SyncState::Local => None,
            SyncState::Connecting(code) | SyncState::Online(code) => Some(code),
            SyncState::Error { code, .. } => Some(code),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, SyncState::Online(_))
    }

    pub fn indicator(&self) -> SyncIndicator {
        match self {
            SyncState::Local => SyncIndicator::Local,
            SyncState::Connecting(code) => SyncIndicator::Connecting(code.to_string()),
            SyncState::Online(code) => SyncIndicator::Synced(code.to_string()),
            SyncState::Error { message, .. } => SyncIndicator::Error(message.clone()),
        }
    }
}

/// カート書き込みの行き先。許可証は常にローカル。
#[derive(Clone)]
pub enum WriteTarget {
    Local,
    Remote(Arc<RemoteGateway>),
}

impl WriteTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, WriteTarget::Local)
    }
}

struct ActiveSubscription {
    code: NamespaceCode,
    handle: Box<dyn RemoteSubscription>,
    token: CancellationToken,
    pump: JoinHandle<()>,
}

impl ActiveSubscription {
    fn cancel(&mut self) {
        self.token.cancel();
        self.handle.unsubscribe();
        self.pump.abort();
        tracing::debug!(target: "cart_tracker::sync", code = %self.code, "remote subscription cancelled");
    }
}

/// 共有コードに応じてローカル / オンラインを切り替える。
///
/// モード切り替えは内部の Mutex で直列化され、購読は常に高々 1 つ。
pub struct SyncCoordinator {
    state: SharedTrackerState,
    local: Arc<LocalGateway>,
    remote_store: Option<Arc<dyn RemoteDocumentStore>>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    subscription: Mutex<Option<ActiveSubscription>>,
    gateway: RwLock<Option<Arc<RemoteGateway>>>,
    state_tx: watch::Sender<SyncState>,
    indicator_tx: watch::Sender<SyncIndicator>,
}

impl SyncCoordinator {
    pub fn new(
        state: SharedTrackerState,
        local: Arc<LocalGateway>,
        remote_store: Option<Arc<dyn RemoteDocumentStore>>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Local);
        let (indicator_tx, _) = watch::channel(SyncIndicator::Local);
        Self {
            state,
            local,
            remote_store,
            clock,
            events,
            subscription: Mutex::new(None),
            gateway: RwLock::new(None),
            state_tx,
            indicator_tx,
        }
    }

    pub fn sync_state(&self) -> SyncState {
        self.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    pub fn sync_indicator(&self) -> SyncIndicator {
        self.indicator_tx.borrow().clone()
    }

    pub async fn has_active_subscription(&self) -> bool {
        self.subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| active.handle.is_active())
    }

    /// 共有コードを設定する。空文字ならローカルモードに戻る。
    ///
    /// リモート側の失敗は `Err` ではなく `SyncState::Error` として返す。
    /// `Err` になるのはローカルストアの失敗のみ。
    pub async fn set_namespace_code(&self, raw: &str) -> Result<SyncState, AppError> {
        let requested = NamespaceCode::parse(raw);
        let mut subscription = self.subscription.lock().await;

        let current = self.sync_state();
        if let Some(code) = &requested {
            match &current {
                SyncState::Online(active) | SyncState::Connecting(active) if active == code => {
                    tracing::debug!(target: "cart_tracker::sync", code = %code, "namespace code unchanged");
                    return Ok(current);
                }
                _ => {}
            }
        }

        let left_remote = match subscription.take() {
            Some(mut active) => {
                active.cancel();
                true
            }
            None => false,
        };
        *self.gateway.write().await = None;

        match requested {
            Some(code) => {
                // 旧コードのリモートのカートはメモリに残さない
                if left_remote {
                    self.restore_local().await?;
                }
                self.connect(code, &mut subscription).await
            }
            None => self.go_local().await,
        }
    }

    /// 起動時に保存済みのコードがあれば接続し直す。
    pub async fn resume(&self) -> Result<SyncState, AppError> {
        match self.local.load_code().await? {
            Some(code) => {
                tracing::info!(target: "cart_tracker::sync", code = %code, "resuming shared session");
                self.set_namespace_code(code.as_str()).await
            }
            None => Ok(self.sync_state()),
        }
    }

    pub async fn write_target(&self) -> WriteTarget {
        match self.gateway.read().await.as_ref() {
            Some(gateway) => WriteTarget::Remote(Arc::clone(gateway)),
            None => WriteTarget::Local,
        }
    }

    /// リモート保存の失敗。オンラインのまま表示だけをエラーにする。
    pub fn report_remote_failure(&self, err: &SyncError) {
        tracing::warn!(target: "cart_tracker::sync", error = %err, "remote save failed");
        self.set_indicator(SyncIndicator::Error(format!("Sync error: {err}")));
    }

    pub fn report_remote_success(&self) {
        if let SyncState::Online(code) = self.sync_state() {
            self.set_indicator(SyncIndicator::Synced(code.to_string()));
        }
    }

    pub async fn shutdown(&self) {
        if let Some(mut active) = self.subscription.lock().await.take() {
            active.cancel();
        }
        *self.gateway.write().await = None;
    }

    async fn connect(
        &self,
        code: NamespaceCode,
        slot: &mut Option<ActiveSubscription>,
    ) -> Result<SyncState, AppError> {
        self.local.save_code(&code).await?;
        self.transition(SyncState::Connecting(code.clone()));

        let Some(store) = self.remote_store.clone() else {
            return Ok(self.fail(code, REMOTE_UNAVAILABLE.to_string()));
        };
        let gateway = Arc::new(RemoteGateway::new(
            Arc::clone(&store),
            code.clone(),
            Arc::clone(&self.clock),
        ));

        let carts = match gateway.load_carts().await {
            Ok(carts) => carts,
            Err(err) => return Ok(self.fail(code, format!("Connection failed: {err}"))),
        };

        // 購読に失敗したら台帳には手を付けない
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = match store.subscribe(&code, sender).await {
            Ok(handle) => handle,
            Err(err) => return Ok(self.fail(code, format!("Connection failed: {err}"))),
        };

        let count = carts.len();
        let pruned = self.state.write().await.apply_remote_carts(carts);

        let token = CancellationToken::new();
        let pump = self.spawn_pump(code.clone(), receiver, token.clone());
        *slot = Some(ActiveSubscription {
            code: code.clone(),
            handle,
            token,
            pump,
        });
        *self.gateway.write().await = Some(gateway);

        let state = SyncState::Online(code.clone());
        self.transition(state.clone());
        self.events.render(RenderReason::ModeChanged);
        tracing::info!(
            target: "cart_tracker::sync",
            code = %code,
            carts = count,
            pruned_markers = pruned,
            "shared session online"
        );
        Ok(state)
    }

    async fn go_local(&self) -> Result<SyncState, AppError> {
        self.local.clear_code().await?;
        self.transition(SyncState::Local);

        self.restore_local().await?;
        self.events.render(RenderReason::ModeChanged);
        tracing::info!(target: "cart_tracker::sync", "switched to local mode");
        Ok(SyncState::Local)
    }

    /// メモリ上の台帳をローカル保存分に戻す。
    async fn restore_local(&self) -> Result<(), AppError> {
        let snapshot = self.local.load().await?;
        self.state.write().await.restore(snapshot);
        Ok(())
    }

    fn spawn_pump(
        &self,
        code: NamespaceCode,
        mut receiver: mpsc::UnboundedReceiver<LocationDocument>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                let document = tokio::select! {
                    _ = token.cancelled() => break,
                    document = receiver.recv() => match document {
                        Some(document) => document,
                        None => {
                            if !token.is_cancelled() {
                                tracing::warn!(target: "cart_tracker::sync", code = %code, "remote feed closed");
                            }
                            break;
                        }
                    },
                };

                let count = document.carts.len();
                {
                    let mut guard = state.write().await;
                    // 解除後に届いた更新でローカル台帳を上書きしない
                    if token.is_cancelled() {
                        break;
                    }
                    guard.apply_remote_carts(document.carts);
                }
                tracing::debug!(target: "cart_tracker::sync", code = %code, carts = count, "remote update applied");
                events.render(RenderReason::RemoteUpdate);
            }
        })
    }

    fn fail(&self, code: NamespaceCode, message: String) -> SyncState {
        tracing::warn!(target: "cart_tracker::sync", code = %code, error = %message, "shared session unavailable");
        let state = SyncState::Error { code, message };
        self.transition(state.clone());
        self.events.render(RenderReason::ModeChanged);
        state
    }

    fn transition(&self, next: SyncState) {
        let indicator = next.indicator();
        self.state_tx.send_replace(next);
        self.set_indicator(indicator);
    }

    fn set_indicator(&self, indicator: SyncIndicator) {
        let previous = self.indicator_tx.send_replace(indicator.clone());
        if previous != indicator {
            self.events
                .publish(TrackerEvent::SyncStatusChanged { indicator });
        }
    }
}
