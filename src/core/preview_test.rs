use super::preview::{read_preview, PreviewStore};
use bytes::Bytes;
use tempfile::TempDir;
use uuid::Uuid;

#[test]
fn release_happens_exactly_once() {
    let mut store = PreviewStore::new();
    let id = Uuid::new_v4();
    assert!(store.allocate(id, Some(Bytes::from_static(b"jpeg"))));

    assert!(store.release(id));
    assert!(!store.release(id), "second release must be a no-op");
}

#[test]
fn releasing_an_item_without_a_handle_is_a_noop() {
    let mut store = PreviewStore::new();
    assert!(!store.release(Uuid::new_v4()));
}

#[test]
fn failed_allocation_does_not_hold_a_handle() {
    let mut store = PreviewStore::new();
    let id = Uuid::new_v4();
    assert!(!store.allocate(id, None));
    assert!(store.get(id).is_none());
    assert!(store.is_empty());
}

#[test]
fn release_all_clears_everything() {
    let mut store = PreviewStore::new();
    for _ in 0..3 {
        store.allocate(Uuid::new_v4(), Some(Bytes::from_static(b"x")));
    }
    assert_eq!(store.len(), 3);
    assert_eq!(store.release_all(), 3);
    assert!(store.is_empty());
    assert_eq!(store.release_all(), 0);
}

#[tokio::test]
async fn read_preview_returns_leading_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.jpg");
    std::fs::write(&path, b"tiny image data").unwrap();

    let data = read_preview(&path).await.unwrap();
    assert_eq!(&data[..], b"tiny image data");
}

#[tokio::test]
async fn read_preview_is_bounded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.jpg");
    std::fs::write(&path, vec![0u8; 100 * 1024]).unwrap();

    let data = read_preview(&path).await.unwrap();
    assert_eq!(data.len(), 64 * 1024);
}

#[tokio::test]
async fn read_preview_of_a_missing_file_is_none() {
    assert!(read_preview(std::path::Path::new("/nonexistent/preview.jpg"))
        .await
        .is_none());
}
