use crate::application::ports::{
    DocumentSender, LocationDocument, RemoteDocumentStore, RemoteSubscription,
};
use crate::domain::value_objects::NamespaceCode;
use crate::shared::error::SyncError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Default)]
struct StoreInner {
    documents: HashMap<String, Map<String, Value>>,
    listeners: HashMap<String, Vec<(u64, DocumentSender)>>,
    next_listener_id: u64,
    unavailable: bool,
}

/// プロセス内で共有されるドキュメントストア。
///
/// 同じインスタンスを複数の `TrackerContext` に渡すと、端末間同期と同じ振る舞いになる。
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` にするとすべての操作が `SyncError::Unavailable` になる。
    pub fn set_available(&self, available: bool) {
        lock(&self.inner).unavailable = !available;
    }

    pub fn active_subscriptions(&self, code: &NamespaceCode) -> usize {
        lock(&self.inner)
            .listeners
            .get(code.as_str())
            .map_or(0, Vec::len)
    }

    pub fn total_subscriptions(&self) -> usize {
        lock(&self.inner).listeners.values().map(Vec::len).sum()
    }

    /// 任意の JSON で文書を上書きする。購読者には通知しない。
    pub fn put_raw(&self, code: &NamespaceCode, document: Value) {
        let fields = match document {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        lock(&self.inner)
            .documents
            .insert(code.as_str().to_string(), fields);
    }

    pub fn raw_document(&self, code: &NamespaceCode) -> Option<Value> {
        lock(&self.inner)
            .documents
            .get(code.as_str())
            .cloned()
            .map(Value::Object)
    }

    fn ensure_available(inner: &StoreInner) -> Result<(), SyncError> {
        if inner.unavailable {
            return Err(SyncError::Unavailable(
                "in-memory document store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn lock(inner: &Mutex<StoreInner>) -> MutexGuard<'_, StoreInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn decode(fields: &Map<String, Value>) -> Result<LocationDocument, SyncError> {
    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|err| SyncError::Malformed(err.to_string()))
}

#[async_trait]
impl RemoteDocumentStore for InMemoryDocumentStore {
    async fn fetch(&self, code: &NamespaceCode) -> Result<Option<LocationDocument>, SyncError> {
        let inner = lock(&self.inner);
        Self::ensure_available(&inner)?;
        inner.documents.get(code.as_str()).map(decode).transpose()
    }

    async fn merge(
        &self,
        code: &NamespaceCode,
        document: LocationDocument,
    ) -> Result<(), SyncError> {
        let mut inner = lock(&self.inner);
        Self::ensure_available(&inner)?;

        let Value::Object(incoming) = serde_json::to_value(&document)
            .map_err(|err| SyncError::Malformed(err.to_string()))?
        else {
            return Err(SyncError::Malformed(
                "document must serialize to an object".to_string(),
            ));
        };

        let fields = inner
            .documents
            .entry(code.as_str().to_string())
            .or_default();
        for (key, value) in incoming {
            fields.insert(key, value);
        }
        let merged = decode(fields)?;

        if let Some(listeners) = inner.listeners.get_mut(code.as_str()) {
            listeners.retain(|(_, sink)| sink.send(merged.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        code: &NamespaceCode,
        sink: DocumentSender,
    ) -> Result<Box<dyn RemoteSubscription>, SyncError> {
        let mut inner = lock(&self.inner);
        Self::ensure_available(&inner)?;

        // 購読開始時点の内容をまず 1 回届ける
        if let Some(fields) = inner.documents.get(code.as_str()) {
            let _ = sink.send(decode(fields)?);
        }

        let listener_id = inner.next_listener_id;
        inner.next_listener_id += 1;
        inner
            .listeners
            .entry(code.as_str().to_string())
            .or_default()
            .push((listener_id, sink));

        Ok(Box::new(InMemorySubscription {
            store: Arc::downgrade(&self.inner),
            code: code.clone(),
            listener_id,
            active: true,
        }))
    }
}

struct InMemorySubscription {
    store: Weak<Mutex<StoreInner>>,
    code: NamespaceCode,
    listener_id: u64,
    active: bool,
}

impl RemoteSubscription for InMemorySubscription {
    fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(store) = self.store.upgrade() {
            let mut inner = lock(&store);
            if let Some(listeners) = inner.listeners.get_mut(self.code.as_str()) {
                listeners.retain(|(id, _)| *id != self.listener_id);
                if listeners.is_empty() {
                    inner.listeners.remove(self.code.as_str());
                }
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
