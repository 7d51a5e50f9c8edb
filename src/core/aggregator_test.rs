use super::aggregator::summarize;
use super::model::{FileDescriptor, ItemStatus, UploadItem};
use std::path::PathBuf;

fn item(status: ItemStatus, progress: u8) -> UploadItem {
    let mut item = UploadItem::new(FileDescriptor {
        display_name: "kitchen.jpg".to_string(),
        path: PathBuf::from("/tmp/kitchen.jpg"),
        size: 1024,
        mime: "image/jpeg".to_string(),
    });
    item.status = status;
    item.progress = progress;
    item
}

#[test]
fn empty_batch_is_all_zero() {
    let summary = summarize(&[]);
    assert_eq!(summary.overall_progress, 0);
    assert_eq!(summary.completed_count, 0);
    assert_eq!(summary.failed_count, 0);
    assert!(summary.currently_uploading.is_empty());
}

#[test]
fn overall_progress_is_the_rounded_mean() {
    // completed counts as 100 regardless of its stored progress
    let items = vec![
        item(ItemStatus::Completed, 100),
        item(ItemStatus::Uploading, 50),
        item(ItemStatus::Pending, 0),
    ];
    // (100 + 50 + 0) / 3 = 50
    assert_eq!(summarize(&items).overall_progress, 50);

    let items = vec![
        item(ItemStatus::Completed, 100),
        item(ItemStatus::Uploading, 1),
    ];
    // 50.5 rounds to 51
    assert_eq!(summarize(&items).overall_progress, 51);
}

#[test]
fn counts_by_status() {
    let items = vec![
        item(ItemStatus::Completed, 100),
        item(ItemStatus::Failed, 0),
        item(ItemStatus::Failed, 0),
        item(ItemStatus::Pending, 0),
        item(ItemStatus::Paused, 0),
        item(ItemStatus::Uploading, 30),
    ];
    let summary = summarize(&items);
    assert_eq!(summary.completed_count, 1);
    assert_eq!(summary.failed_count, 2);
    assert_eq!(summary.pending_count, 1);
    assert_eq!(summary.paused_count, 1);
    assert_eq!(summary.currently_uploading.len(), 1);
    assert_eq!(summary.currently_uploading[0], items[5].id);
}

#[test]
fn order_independent() {
    let mut items = vec![
        item(ItemStatus::Completed, 100),
        item(ItemStatus::Uploading, 40),
        item(ItemStatus::Failed, 0),
        item(ItemStatus::Pending, 0),
    ];
    let forward = summarize(&items);
    items.reverse();
    let backward = summarize(&items);
    assert_eq!(forward.overall_progress, backward.overall_progress);
    assert_eq!(forward.completed_count, backward.completed_count);
    assert_eq!(forward.failed_count, backward.failed_count);
}

#[test]
fn idempotent() {
    let items = vec![item(ItemStatus::Uploading, 70), item(ItemStatus::Pending, 0)];
    assert_eq!(summarize(&items), summarize(&items));
}
