use crate::core::model::ItemId;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Upper bound on preview data held per item; enough for a thumbnail decode.
const PREVIEW_BYTES: usize = 64 * 1024;

/// Short-lived local display handle for an accepted image.
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    pub data: Bytes,
}

/// Owns at most one preview handle per item. A handle is released exactly
/// once: either when the item is removed or when the whole batch is torn
/// down, whichever happens first.
#[derive(Debug, Default)]
pub struct PreviewStore {
    handles: HashMap<ItemId, PreviewHandle>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best-effort allocation: a read failure must not block the item from
    /// being queued, so callers pass `None` and move on.
    pub fn allocate(&mut self, id: ItemId, data: Option<Bytes>) -> bool {
        match data {
            Some(data) => {
                self.handles.insert(id, PreviewHandle { data });
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&PreviewHandle> {
        self.handles.get(&id)
    }

    /// Returns `true` if a handle was actually held. Releasing an item with
    /// no handle is a no-op.
    pub fn release(&mut self, id: ItemId) -> bool {
        self.handles.remove(&id).is_some()
    }

    /// Batch teardown: releases everything still held, returns the count.
    pub fn release_all(&mut self) -> usize {
        let n = self.handles.len();
        self.handles.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Best-effort preview read: the leading bytes of the file, or `None` when
/// the file cannot be opened. Never an error, so a failed preview cannot
/// keep an item out of the queue.
pub async fn read_preview(path: &Path) -> Option<Bytes> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut buf = vec![0u8; PREVIEW_BYTES];
    let mut filled = 0;
    loop {
        let n = file.read(&mut buf[filled..]).await.ok()?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == buf.len() {
            break;
        }
    }
    buf.truncate(filled);
    Some(Bytes::from(buf))
}
