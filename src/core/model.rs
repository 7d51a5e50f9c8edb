use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

pub type ItemId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
    Paused,
}

/// Raw file descriptor produced by intake; immutable after intake.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Display label. For folder intake this is the path relative to the
    /// selected folder, otherwise the bare file name.
    pub display_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime: String,
}

#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: ItemId,
    pub payload: FileDescriptor,
    pub status: ItemStatus,
    /// 0-100, monotonically non-decreasing while `Uploading`.
    pub progress: u8,
    /// Present only while `Failed`.
    pub error: Option<String>,
    /// Bumped each time the item re-enters `Pending` from `Failed`.
    pub retry_count: u32,
    /// Whether a preview handle is currently held for this item.
    pub has_preview: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl UploadItem {
    pub fn new(payload: FileDescriptor) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            status: ItemStatus::Pending,
            progress: 0,
            error: None,
            retry_count: 0,
            has_preview: false,
            started_at: None,
            ended_at: None,
        }
    }

    /// An item born rejected: `Failed` before any network activity.
    pub fn rejected(payload: FileDescriptor, reason: String) -> Self {
        let mut item = Self::new(payload);
        item.status = ItemStatus::Failed;
        item.error = Some(reason);
        item
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// Metadata attached to every upload call.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub category: String,
    pub original_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Derived batch-wide view, recomputed from the items on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub overall_progress: u8,
    pub completed_count: usize,
    pub failed_count: usize,
    pub pending_count: usize,
    pub paused_count: usize,
    pub currently_uploading: Vec<ItemId>,
}

/// Immutable snapshot handed to renderers; never aliases control state.
#[derive(Debug, Clone)]
pub struct BatchState {
    pub items: Vec<UploadItem>,
    pub is_active: bool,
    pub is_paused: bool,
    pub summary: BatchSummary,
}
