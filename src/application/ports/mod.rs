pub mod local_store;
pub mod remote_store;

pub use local_store::LocalStore;
pub use remote_store::{DocumentSender, LocationDocument, RemoteDocumentStore, RemoteSubscription};
