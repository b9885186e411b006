use crate::domain::value_objects::ResourceClass;
use thiserror::Error;

/// 台帳操作の失敗理由。いずれも変更前に検出され、台帳は変化しない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{class} {key} is already active")]
    Duplicate { class: ResourceClass, key: String },

    #[error("Validation error: {field} is required")]
    Validation { field: &'static str },
}

/// リモートストアとの同期失敗。UI には返さず同期ステータスに変換する。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed remote document: {0}")]
    Malformed(String),
}

/// ローカルストアへの書き込み失敗。回復処理は想定しない。
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Persist(PersistError::Database(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Persist(PersistError::Serialization(err))
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
