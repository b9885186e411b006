pub mod alert_scheduler;
pub mod events;
pub mod persistence_gateway;
pub mod sync_coordinator;
pub mod tracker_state;

pub use alert_scheduler::{AlertScheduler, SchedulerHandle, TickReport};
pub use events::{EventBus, RenderReason, TrackerEvent};
pub use persistence_gateway::{
    Backend, LedgerSnapshot, LocalGateway, PersistenceGateway, RemoteGateway,
};
pub use sync_coordinator::{SyncCoordinator, SyncState, WriteTarget};
pub use tracker_state::{SharedTrackerState, TrackerState};
