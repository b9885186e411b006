use crate::shared::error::PersistError;
use async_trait::async_trait;

/// 端末ローカルの永続キーバリューストア。
///
/// 値はシリアライズ済みの文字列。書き込みはコミットが完了してから返る。
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// 複数キーを 1 トランザクションで書き込む。
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), PersistError>;

    async fn set(&self, key: &str, value: String) -> Result<(), PersistError> {
        self.set_many(&[(key, value)]).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError>;
}
