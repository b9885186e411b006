use crate::domain::entities::Alert;
use crate::domain::value_objects::{EntryId, SyncIndicator};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderReason {
    Initial,
    LedgerChanged,
    RemoteUpdate,
    ModeChanged,
    Tick,
}

/// コアから UI へ送るイベント。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    Render { reason: RenderReason },
    Alert { alert: Alert },
    AlertDismissed { alert_id: String, entry_id: EntryId },
    AlertsCleared,
    SyncStatusChanged { indicator: SyncIndicator },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TrackerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }

    /// 受信者がいなくても失敗扱いにしない。
    pub fn publish(&self, event: TrackerEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!(target: "cart_tracker::events", "no event receivers attached");
        }
    }

    pub fn render(&self, reason: RenderReason) {
        self.publish(TrackerEvent::Render { reason });
    }
}
