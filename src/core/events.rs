use crate::core::model::{BatchSummary, ItemId, ItemStatus};

#[derive(Debug, Clone)]
pub enum BatchEvent {
    ItemAdded { item_id: ItemId, display_name: String, size: u64, status: ItemStatus },
    ItemRemoved { item_id: ItemId },
    ItemStatusChanged { item_id: ItemId, status: ItemStatus },
    Progress { item_id: ItemId, pct: u8 },
    SummaryChanged { summary: BatchSummary },
    BatchStarted,
    BatchPaused,
    BatchResumed,
    BatchStopped,
    /// Natural drain only; an explicit stop never emits this.
    BatchFinished { summary: BatchSummary },
    Error { scope: String, message: String },
    Info { scope: String, message: String },
}
