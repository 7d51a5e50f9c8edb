use super::intake::{collect, FileSource, FsEntry, IntakeError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(dir: &Path, rel: &str, bytes: usize) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, vec![0u8; bytes]).unwrap();
    path
}

#[tokio::test]
async fn files_source_describes_each_file() {
    let dir = TempDir::new().unwrap();
    let a = touch(dir.path(), "a.jpg", 10);
    let b = touch(dir.path(), "b.png", 20);

    let files = collect(FileSource::Files(vec![a, b])).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].display_name, "a.jpg");
    assert_eq!(files[0].mime, "image/jpeg");
    assert_eq!(files[0].size, 10);
    assert_eq!(files[1].mime, "image/png");
}

#[tokio::test]
async fn folder_source_flattens_and_labels_with_relative_paths() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "a.jpg", 1);
    touch(dir.path(), "sub/b.png", 1);
    touch(dir.path(), "sub/deep/c.gif", 1);

    let files = collect(FileSource::Folder(dir.path().to_path_buf()))
        .await
        .unwrap();
    let labels: Vec<&str> = files.iter().map(|f| f.display_name.as_str()).collect();
    assert_eq!(labels, vec!["a.jpg", "sub/b.png", "sub/deep/c.gif"]);
}

#[tokio::test]
async fn folder_source_keeps_non_images_for_the_validator() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "photo.jpg", 1);
    touch(dir.path(), "notes.txt", 1);

    let files = collect(FileSource::Folder(dir.path().to_path_buf()))
        .await
        .unwrap();
    // folder intake only flattens; acceptance is the validator's call
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn entries_source_recurses_and_filters_to_images() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "root.jpg", 1);
    touch(dir.path(), "nested/one.png", 1);
    touch(dir.path(), "nested/skip.txt", 1);
    touch(dir.path(), "nested/deeper/two.webp", 1);

    let entry = FsEntry::new(dir.path().to_path_buf()).await.unwrap();
    let files = collect(FileSource::Entries(vec![Box::new(entry)]))
        .await
        .unwrap();

    // children are visited in sorted order: nested/deeper before nested/one.png
    let names: Vec<&str> = files.iter().map(|f| f.display_name.as_str()).collect();
    assert_eq!(names, vec!["two.webp", "one.png", "root.jpg"]);
}

#[tokio::test]
async fn empty_selection_is_a_visible_signal() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "readme.md", 1);

    let entry = FsEntry::new(dir.path().to_path_buf()).await.unwrap();
    let err = collect(FileSource::Entries(vec![Box::new(entry)]))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::NoSupportedFiles));
}

#[tokio::test]
async fn empty_folder_is_a_visible_signal() {
    let dir = TempDir::new().unwrap();
    let err = collect(FileSource::Folder(dir.path().to_path_buf()))
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::NoSupportedFiles));
}

#[tokio::test]
async fn folder_source_rejects_a_file_path() {
    let dir = TempDir::new().unwrap();
    let file = touch(dir.path(), "single.jpg", 1);
    let err = collect(FileSource::Folder(file)).await.unwrap_err();
    assert!(matches!(err, IntakeError::NotAFolder(_)));
}

#[tokio::test]
async fn traversal_order_is_stable() {
    let dir = TempDir::new().unwrap();
    for name in ["c.jpg", "a.jpg", "b.jpg"] {
        touch(dir.path(), name, 1);
    }

    let first = collect(FileSource::Folder(dir.path().to_path_buf()))
        .await
        .unwrap();
    let second = collect(FileSource::Folder(dir.path().to_path_buf()))
        .await
        .unwrap();
    let names: Vec<_> = first.iter().map(|f| f.display_name.clone()).collect();
    assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    assert_eq!(
        names,
        second
            .iter()
            .map(|f| f.display_name.clone())
            .collect::<Vec<_>>()
    );
}
