//! Normalizes heterogeneous file sources into a flat, ordered list of
//! descriptors: a multi-select list, a folder (flattened, relative path kept
//! as the display label), or a drag-and-drop entry tree resolved recursively.

use crate::core::model::FileDescriptor;
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum IntakeError {
    /// The source resolved to zero qualifying files. Surfaced to the user,
    /// never swallowed.
    #[error("no supported files in the selection")]
    NoSupportedFiles,

    #[error("not a folder: {0}")]
    NotAFolder(PathBuf),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract entry capability for drag-and-drop style trees. The concrete
/// platform API stays outside the core; tests and the CLI use [`FsEntry`].
#[async_trait]
pub trait IntakeEntry: Send + Sync {
    fn name(&self) -> String;
    fn is_dir(&self) -> bool;
    async fn children(&self) -> Result<Vec<Box<dyn IntakeEntry>>, IntakeError>;
    async fn descriptor(&self) -> Result<FileDescriptor, IntakeError>;
}

pub enum FileSource {
    /// Flat multi-file selection.
    Files(Vec<PathBuf>),
    /// Folder selection, flattened recursively.
    Folder(PathBuf),
    /// Drag-and-drop entries; directories resolved recursively, images only.
    Entries(Vec<Box<dyn IntakeEntry>>),
}

/// Filesystem-backed entry.
pub struct FsEntry {
    path: PathBuf,
    is_dir: bool,
}

impl FsEntry {
    pub async fn new(path: PathBuf) -> Result<Self, IntakeError> {
        let meta = tokio::fs::metadata(&path).await?;
        Ok(Self { is_dir: meta.is_dir(), path })
    }
}

#[async_trait]
impl IntakeEntry for FsEntry {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    async fn children(&self) -> Result<Vec<Box<dyn IntakeEntry>>, IntakeError> {
        let mut dir = tokio::fs::read_dir(&self.path).await?;
        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            paths.push(entry.path());
        }
        // read_dir order is platform-dependent; sort for a stable flat list
        paths.sort();

        let mut out: Vec<Box<dyn IntakeEntry>> = Vec::with_capacity(paths.len());
        for path in paths {
            out.push(Box::new(FsEntry::new(path).await?));
        }
        Ok(out)
    }

    async fn descriptor(&self) -> Result<FileDescriptor, IntakeError> {
        describe_file(&self.path).await
    }
}

pub async fn describe_file(path: &Path) -> Result<FileDescriptor, IntakeError> {
    let meta = tokio::fs::metadata(path).await?;
    let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();
    Ok(FileDescriptor {
        display_name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        size: meta.len(),
        mime,
    })
}

/// Resolves one entry to its leaf files. Depth is unbounded; the breadth of
/// each directory is resolved concurrently, preserving child order.
fn resolve_entry(
    entry: Box<dyn IntakeEntry>,
    images_only: bool,
) -> BoxFuture<'static, Result<Vec<FileDescriptor>, IntakeError>> {
    Box::pin(async move {
        if entry.is_dir() {
            let children = entry.children().await?;
            let resolved = join_all(
                children
                    .into_iter()
                    .map(|child| resolve_entry(child, images_only)),
            )
            .await;

            let mut out = Vec::new();
            for branch in resolved {
                out.extend(branch?);
            }
            Ok(out)
        } else {
            let desc = entry.descriptor().await?;
            if images_only && !desc.mime.starts_with("image/") {
                log::debug!("intake: skipping non-image {}", desc.display_name);
                return Ok(vec![]);
            }
            Ok(vec![desc])
        }
    })
}

/// Normalizes a source into an ordered descriptor list, or reports an empty
/// selection as [`IntakeError::NoSupportedFiles`].
pub async fn collect(source: FileSource) -> Result<Vec<FileDescriptor>, IntakeError> {
    let files = match source {
        FileSource::Files(paths) => {
            let mut out = Vec::with_capacity(paths.len());
            for path in paths {
                let meta = tokio::fs::metadata(&path).await?;
                if !meta.is_file() {
                    log::warn!("intake: skipping non-file {}", path.display());
                    continue;
                }
                out.push(describe_file(&path).await?);
            }
            out
        }
        FileSource::Folder(root) => {
            let entry = FsEntry::new(root.clone()).await?;
            if !entry.is_dir() {
                return Err(IntakeError::NotAFolder(root));
            }
            let mut files = resolve_entry(Box::new(entry), false).await?;
            // the relative path is used only to derive the display label
            for file in &mut files {
                if let Ok(rel) = file.path.strip_prefix(&root) {
                    file.display_name = rel.to_string_lossy().to_string();
                }
            }
            files
        }
        FileSource::Entries(entries) => {
            let resolved =
                join_all(entries.into_iter().map(|e| resolve_entry(e, true))).await;
            let mut out = Vec::new();
            for branch in resolved {
                out.extend(branch?);
            }
            out
        }
    };

    if files.is_empty() {
        return Err(IntakeError::NoSupportedFiles);
    }
    Ok(files)
}
