pub mod memory_local_store;
pub mod sqlite_local_store;

pub use memory_local_store::MemoryLocalStore;
pub use sqlite_local_store::SqliteLocalStore;
