pub mod entry_id;
pub mod namespace_code;
pub mod resource_class;
pub mod sync_indicator;

pub use entry_id::EntryId;
pub use namespace_code::NamespaceCode;
pub use resource_class::ResourceClass;
pub use sync_indicator::SyncIndicator;
