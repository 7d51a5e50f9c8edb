use crate::core::model::{BatchSummary, ItemStatus, UploadItem};

/// Pure derivation of the batch-wide summary. Idempotent, order-independent,
/// no side effects; recomputed whenever any item changes.
pub fn summarize(items: &[UploadItem]) -> BatchSummary {
    if items.is_empty() {
        return BatchSummary::default();
    }

    let mut sum: u64 = 0;
    let mut summary = BatchSummary::default();

    for item in items {
        sum += match item.status {
            ItemStatus::Completed => 100,
            _ => item.progress as u64,
        };
        match item.status {
            ItemStatus::Completed => summary.completed_count += 1,
            ItemStatus::Failed => summary.failed_count += 1,
            ItemStatus::Pending => summary.pending_count += 1,
            ItemStatus::Paused => summary.paused_count += 1,
            ItemStatus::Uploading => summary.currently_uploading.push(item.id),
        }
    }

    let mean = sum as f64 / items.len() as f64;
    summary.overall_progress = mean.round() as u8;
    summary
}
