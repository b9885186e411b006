use async_trait::async_trait;
use cart_tracker::application::ports::{
    DocumentSender, LocationDocument, RemoteDocumentStore, RemoteSubscription,
};
use cart_tracker::domain::value_objects::NamespaceCode;
use cart_tracker::infrastructure::remote::InMemoryDocumentStore;
use cart_tracker::shared::error::SyncError;
use mockall::mock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Semaphore;

mock! {
    pub RemoteStore {}

    #[async_trait]
    impl RemoteDocumentStore for RemoteStore {
        async fn fetch(&self, code: &NamespaceCode) -> Result<Option<LocationDocument>, SyncError>;
        async fn merge(&self, code: &NamespaceCode, document: LocationDocument) -> Result<(), SyncError>;
        async fn subscribe(
            &self,
            code: &NamespaceCode,
            sink: DocumentSender,
        ) -> Result<Box<dyn RemoteSubscription>, SyncError>;
    }
}

/// 何も届かない購読。
#[derive(Debug, Default)]
pub struct IdleSubscription {
    cancelled: bool,
}

impl RemoteSubscription for IdleSubscription {
    fn unsubscribe(&mut self) {
        self.cancelled = true;
    }

    fn is_active(&self) -> bool {
        !self.cancelled
    }
}

/// 取得を手動で通し、書き込みを指定時間だけ遅らせる共有文書ストア。
///
/// mockall の `returning` では await できないため、待ち合わせが要るテストはこちらを使う。
#[derive(Clone)]
pub struct DelayedDocumentStore {
    inner: InMemoryDocumentStore,
    fetch_permits: Arc<Semaphore>,
    merge_delays: Arc<StdMutex<VecDeque<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    merged: Arc<StdMutex<Vec<Vec<String>>>>,
}

impl DelayedDocumentStore {
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self::with_fetch_permits(inner, Semaphore::MAX_PERMITS)
    }

    /// `release_fetch` を呼ぶまで取得が止まる。
    pub fn holding_fetches(inner: InMemoryDocumentStore) -> Self {
        Self::with_fetch_permits(inner, 0)
    }

    fn with_fetch_permits(inner: InMemoryDocumentStore, permits: usize) -> Self {
        Self {
            inner,
            fetch_permits: Arc::new(Semaphore::new(permits)),
            merge_delays: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
            merged: Arc::default(),
        }
    }

    pub fn release_fetch(&self) {
        self.fetch_permits.add_permits(1);
    }

    /// 以降の書き込みに順に適用する遅延。
    pub fn delay_merges(&self, delays: impl IntoIterator<Item = Duration>) {
        self.merge_delays.lock().unwrap().extend(delays);
    }

    /// 完了した書き込みのカート番号を完了順に返す。
    pub fn merged_numbers(&self) -> Vec<Vec<String>> {
        self.merged.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteDocumentStore for DelayedDocumentStore {
    async fn fetch(&self, code: &NamespaceCode) -> Result<Option<LocationDocument>, SyncError> {
        let permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|err| SyncError::Unavailable(err.to_string()))?;
        permit.forget();
        self.inner.fetch(code).await
    }

    async fn merge(&self, code: &NamespaceCode, document: LocationDocument) -> Result<(), SyncError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = self.merge_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let numbers = document.carts.iter().map(|cart| cart.number.clone()).collect();
        let result = self.inner.merge(code, document).await;
        self.merged.lock().unwrap().push(numbers);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn subscribe(
        &self,
        code: &NamespaceCode,
        sink: DocumentSender,
    ) -> Result<Box<dyn RemoteSubscription>, SyncError> {
        self.inner.subscribe(code, sink).await
    }
}
