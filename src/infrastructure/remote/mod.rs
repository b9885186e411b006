pub mod memory_document_store;

pub use memory_document_store::InMemoryDocumentStore;
