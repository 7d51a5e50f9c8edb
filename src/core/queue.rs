//! The queue controller: a bounded set of in-flight uploads drained from a
//! FIFO pending queue, with race-free pause/resume/stop/retry.
//!
//! Control state lives behind one mutex that is never held across an await,
//! so every mutation happens at a synchronous control point: start, dispatch,
//! per-item settle, pause, resume, stop, retry. Renderers never see this
//! state directly; they get cloned snapshots and broadcast events.

use crate::core::aggregator::summarize;
use crate::core::events::BatchEvent;
use crate::core::intake::{self, FileSource, IntakeError};
use crate::core::model::{
    BatchState, FileDescriptor, ItemId, ItemStatus, UploadItem, UploadMeta,
};
use crate::core::preview::{read_preview, PreviewStore};
use crate::core::transport::{ProgressFn, TransportOutcome, UploadTransport};
use crate::core::validator::ValidationPolicy;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
    NothingToUpload,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntakeReport {
    pub accepted: usize,
    pub rejected: usize,
}

struct ControlState {
    items: Vec<UploadItem>,
    previews: PreviewStore,
    pending: VecDeque<ItemId>,
    active: usize,
    is_active: bool,
    is_paused: bool,
    should_stop: bool,
    /// Token for the current run; regenerated on start and resume, cancelled
    /// by pause and stop.
    cancel: CancellationToken,
}

impl ControlState {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            previews: PreviewStore::new(),
            pending: VecDeque::new(),
            active: 0,
            is_active: false,
            is_paused: false,
            should_stop: false,
            cancel: CancellationToken::new(),
        }
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut UploadItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }
}

#[derive(Clone)]
pub struct BatchUploader {
    transport: Arc<dyn UploadTransport>,
    policy: ValidationPolicy,
    category: String,
    max_concurrent: usize,
    event_tx: broadcast::Sender<BatchEvent>,
    idle_tx: Arc<watch::Sender<bool>>,
    state: Arc<Mutex<ControlState>>,
}

impl BatchUploader {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        policy: ValidationPolicy,
        category: impl Into<String>,
        max_concurrent: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (idle_tx, _) = watch::channel(true);
        Self {
            transport,
            policy,
            category: category.into(),
            max_concurrent: max_concurrent.max(1),
            event_tx,
            idle_tx: Arc::new(idle_tx),
            state: Arc::new(Mutex::new(ControlState::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    /// Intake + validation. Rejected files become items born `Failed` so the
    /// user reviews accepted and rejected files in the same list; previews
    /// are allocated best-effort for accepted images.
    pub async fn add_files(&self, source: FileSource) -> Result<IntakeReport, IntakeError> {
        let files = intake::collect(source).await?;

        let mut report = IntakeReport::default();
        for file in files {
            let verdict = self.policy.validate(&file);
            let preview: Option<Bytes> = if verdict.is_ok() {
                read_preview(&file.path).await
            } else {
                None
            };

            let mut item = match verdict {
                Ok(()) => {
                    report.accepted += 1;
                    UploadItem::new(file)
                }
                Err(reason) => {
                    log::info!("rejected {}: {}", file.display_name, reason);
                    report.rejected += 1;
                    UploadItem::rejected(file, reason.to_string())
                }
            };

            let added = {
                let mut st = self.state.lock();
                item.has_preview = st.previews.allocate(item.id, preview);
                let event = BatchEvent::ItemAdded {
                    item_id: item.id,
                    display_name: item.payload.display_name.clone(),
                    size: item.payload.size,
                    status: item.status,
                };
                st.items.push(item);
                event
            };
            self.emit(added);
        }

        self.emit_summary();
        Ok(report)
    }

    /// Seeds the pending queue from every `Pending` or `Failed` item and
    /// begins dispatching. The `Failed -> Pending` move counts as a retry.
    pub fn start(&self) -> StartOutcome {
        let changed: Vec<ItemId>;
        let queued;
        {
            let mut st = self.state.lock();
            if st.is_active {
                return StartOutcome::AlreadyActive;
            }

            let seed: Vec<ItemId> = st
                .items
                .iter()
                .filter(|i| matches!(i.status, ItemStatus::Pending | ItemStatus::Failed))
                .map(|i| i.id)
                .collect();
            if seed.is_empty() {
                self.emit(BatchEvent::Info {
                    scope: "start".to_string(),
                    message: "nothing to upload".to_string(),
                });
                return StartOutcome::NothingToUpload;
            }

            changed = seed
                .iter()
                .copied()
                .filter(|&id| {
                    st.items
                        .iter()
                        .any(|i| i.id == id && i.status == ItemStatus::Failed)
                })
                .collect();
            st.pending.clear();
            for &id in &seed {
                if let Some(item) = st.item_mut(id) {
                    if item.status == ItemStatus::Failed {
                        item.retry_count += 1;
                        item.error = None;
                    }
                    item.status = ItemStatus::Pending;
                    item.progress = 0;
                }
                st.pending.push_back(id);
            }

            queued = seed.len();
            st.is_active = true;
            st.is_paused = false;
            st.should_stop = false;
            st.cancel = CancellationToken::new();
            self.idle_tx.send_replace(false);
        }

        log::info!("batch started ({} queued)", queued);
        for id in changed {
            self.emit(BatchEvent::ItemStatusChanged { item_id: id, status: ItemStatus::Pending });
        }
        self.emit(BatchEvent::BatchStarted);
        self.pump();
        StartOutcome::Started
    }

    /// Suspends dispatch and cancels in-flight calls. The batch stays
    /// active: only stop or a natural drain may clear that flag, otherwise
    /// resume could not tell "paused mid-flight" from "nothing to do".
    pub fn pause(&self) {
        {
            let mut st = self.state.lock();
            if !st.is_active || st.is_paused {
                return;
            }
            st.is_paused = true;
            st.cancel.cancel();
        }
        log::info!("batch paused");
        self.emit(BatchEvent::BatchPaused);
    }

    /// Requires only `is_paused` (pause preserves `is_active`). Moves every
    /// `Paused` item back to `Pending`, re-seeds the queue in display order
    /// and restarts the dispatch loop under a fresh cancellation token.
    pub fn resume(&self) -> bool {
        let woken: Vec<ItemId>;
        {
            let mut st = self.state.lock();
            if !st.is_paused {
                return false;
            }
            woken = st
                .items
                .iter()
                .filter(|i| i.status == ItemStatus::Paused)
                .map(|i| i.id)
                .collect();
            for &id in &woken {
                if let Some(item) = st.item_mut(id) {
                    item.status = ItemStatus::Pending;
                    item.progress = 0;
                }
            }
            st.pending = st
                .items
                .iter()
                .filter(|i| i.status == ItemStatus::Pending)
                .map(|i| i.id)
                .collect();
            st.is_paused = false;
            st.cancel = CancellationToken::new();
        }

        log::info!("batch resumed ({} items requeued)", woken.len());
        for id in woken {
            self.emit(BatchEvent::ItemStatusChanged { item_id: id, status: ItemStatus::Pending });
        }
        self.emit(BatchEvent::BatchResumed);
        self.emit_summary();
        self.pump();
        true
    }

    /// Halts the batch immediately. In-flight calls are cancelled and settle
    /// as `Paused`; items still `Pending` keep that status so a later
    /// inspection shows exactly what ran and what did not.
    pub fn stop(&self) {
        {
            let mut st = self.state.lock();
            if !st.is_active && st.active == 0 {
                return;
            }
            st.should_stop = true;
            st.is_active = false;
            st.is_paused = false;
            st.cancel.cancel();
            if st.active == 0 {
                self.idle_tx.send_replace(true);
            }
        }
        log::info!("batch stopped");
        self.emit(BatchEvent::BatchStopped);
    }

    /// Moves one `Failed` item back to `Pending`. Never starts an inactive
    /// batch by itself; when the batch is running it kicks the dispatch loop
    /// so a free slot is used right away.
    pub fn retry_one(&self, id: ItemId) -> bool {
        let kick;
        {
            let mut st = self.state.lock();
            match st.item_mut(id) {
                Some(item) if item.status == ItemStatus::Failed => {
                    item.status = ItemStatus::Pending;
                    item.progress = 0;
                    item.error = None;
                    item.retry_count += 1;
                }
                _ => return false,
            }
            st.pending.push_back(id);
            kick = st.is_active && !st.is_paused;
        }
        self.emit(BatchEvent::ItemStatusChanged { item_id: id, status: ItemStatus::Pending });
        self.emit_summary();
        if kick {
            self.pump();
        }
        true
    }

    /// Retries every `Failed` item; returns how many were requeued.
    pub fn retry_failed(&self) -> usize {
        let (ids, kick) = {
            let mut st = self.state.lock();
            let ids: Vec<ItemId> = st
                .items
                .iter()
                .filter(|i| i.status == ItemStatus::Failed)
                .map(|i| i.id)
                .collect();
            for &id in &ids {
                if let Some(item) = st.item_mut(id) {
                    item.status = ItemStatus::Pending;
                    item.progress = 0;
                    item.error = None;
                    item.retry_count += 1;
                }
                st.pending.push_back(id);
            }
            (ids, st.is_active && !st.is_paused)
        };

        for &id in &ids {
            self.emit(BatchEvent::ItemStatusChanged { item_id: id, status: ItemStatus::Pending });
        }
        if !ids.is_empty() {
            self.emit_summary();
            if kick {
                self.pump();
            }
        }
        ids.len()
    }

    /// Removes an item and releases its preview handle. Refused while the
    /// item is `Uploading`; pause first.
    pub fn remove(&self, id: ItemId) -> bool {
        {
            let mut st = self.state.lock();
            let Some(idx) = st.items.iter().position(|i| i.id == id) else {
                return false;
            };
            if st.items[idx].status == ItemStatus::Uploading {
                log::warn!("refusing to remove in-flight item {}", id);
                return false;
            }
            st.items.remove(idx);
            st.pending.retain(|&queued| queued != id);
            st.previews.release(id);
        }
        self.emit(BatchEvent::ItemRemoved { item_id: id });
        self.emit_summary();
        true
    }

    /// Batch teardown (dialog closed): stops the run and releases every
    /// preview handle still held.
    pub fn dispose(&self) {
        self.stop();
        let released = {
            let mut st = self.state.lock();
            for item in &mut st.items {
                item.has_preview = false;
            }
            st.previews.release_all()
        };
        if released > 0 {
            log::debug!("released {} preview handles on teardown", released);
        }
    }

    pub fn preview(&self, id: ItemId) -> Option<Bytes> {
        self.state.lock().previews.get(id).map(|h| h.data.clone())
    }

    /// Immutable snapshot for renderers.
    pub fn snapshot(&self) -> BatchState {
        let st = self.state.lock();
        BatchState {
            items: st.items.clone(),
            is_active: st.is_active,
            is_paused: st.is_paused,
            summary: summarize(&st.items),
        }
    }

    /// Resolves once no upload is in flight and the batch is inactive
    /// (natural drain or stop).
    pub async fn wait_idle(&self) {
        let mut rx = self.idle_tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// The dispatch loop. Re-entrant: runs after start/resume and after
    /// every settle. Exits on pause *without* touching `is_active`; on stop
    /// or an empty queue it finalizes once the last in-flight call settles,
    /// and only a natural drain emits `BatchFinished`.
    fn pump(&self) {
        let mut dispatched: Vec<(ItemId, FileDescriptor, CancellationToken)> = Vec::new();
        let mut rejected: Vec<ItemId> = Vec::new();
        let mut finished = None;
        {
            let mut st = self.state.lock();
            if st.is_paused {
                return;
            }
            if !st.should_stop && !st.pending.is_empty() {
                while st.active < self.max_concurrent {
                    let Some(id) = st.pending.pop_front() else {
                        break;
                    };
                    // stale entries: removed items or ids whose status moved on
                    let payload = {
                        let Some(item) = st.item_mut(id) else {
                            continue;
                        };
                        if item.status != ItemStatus::Pending {
                            continue;
                        }
                        // a rejected item may be requeued by start() or a
                        // retry; it re-fails here, still with no network call
                        if let Err(reason) = self.policy.validate(&item.payload) {
                            item.status = ItemStatus::Failed;
                            item.error = Some(reason.to_string());
                            item.ended_at = Some(Utc::now());
                            rejected.push(id);
                            continue;
                        }
                        item.status = ItemStatus::Uploading;
                        item.progress = 0;
                        item.error = None;
                        item.started_at = Some(Utc::now());
                        item.ended_at = None;
                        item.payload.clone()
                    };
                    st.active += 1;
                    dispatched.push((id, payload, st.cancel.clone()));
                }
            }
            if (st.should_stop || st.pending.is_empty()) && st.active == 0 {
                let natural = st.is_active && !st.should_stop;
                st.is_active = false;
                if natural {
                    finished = Some(summarize(&st.items));
                }
                self.idle_tx.send_replace(true);
            }
        }

        for id in rejected {
            self.emit(BatchEvent::ItemStatusChanged { item_id: id, status: ItemStatus::Failed });
        }

        for (id, payload, token) in dispatched {
            self.emit(BatchEvent::ItemStatusChanged { item_id: id, status: ItemStatus::Uploading });
            let this = self.clone();
            let meta = UploadMeta {
                category: self.category.clone(),
                original_name: payload.display_name.clone(),
                timestamp: Utc::now(),
            };
            tokio::spawn(async move {
                let progress: ProgressFn = {
                    let this = this.clone();
                    Arc::new(move |pct| this.on_progress(id, pct))
                };
                let outcome = this.transport.upload(&payload, &meta, progress, token).await;
                this.on_settled(id, outcome);
            });
        }

        if let Some(summary) = finished {
            log::info!(
                "batch finished: {} completed, {} failed",
                summary.completed_count,
                summary.failed_count
            );
            self.emit(BatchEvent::BatchFinished { summary: summary.clone() });
            self.emit(BatchEvent::SummaryChanged { summary });
        }
    }

    fn on_progress(&self, id: ItemId, pct: u8) {
        {
            let mut st = self.state.lock();
            let Some(item) = st.item_mut(id) else {
                return;
            };
            // progress is monotonic while uploading; late or out-of-order
            // reports are dropped
            if item.status != ItemStatus::Uploading {
                return;
            }
            let pct = pct.min(100);
            if pct <= item.progress {
                return;
            }
            item.progress = pct;
        }
        self.emit(BatchEvent::Progress { item_id: id, pct: pct.min(100) });
    }

    /// Single settle point: releases the concurrency slot, applies the
    /// outcome, then re-enters the dispatch loop.
    fn on_settled(&self, id: ItemId, outcome: TransportOutcome) {
        let mut events: Vec<BatchEvent> = Vec::with_capacity(2);
        {
            let mut st = self.state.lock();
            st.active -= 1;
            let now = Utc::now();
            if let Some(item) = st.item_mut(id) {
                match outcome {
                    TransportOutcome::Completed(_) => {
                        item.status = ItemStatus::Completed;
                        item.progress = 100;
                        item.error = None;
                        item.ended_at = Some(now);
                        log::info!("uploaded {}", item.payload.display_name);
                    }
                    TransportOutcome::Failed(err) => {
                        item.status = ItemStatus::Failed;
                        item.error = Some(err.to_string());
                        item.ended_at = Some(now);
                        log::warn!("upload failed for {}: {}", item.payload.display_name, err);
                    }
                    TransportOutcome::Cancelled => {
                        item.status = ItemStatus::Paused;
                        item.progress = 0;
                        item.error = None;
                        item.ended_at = Some(now);
                        log::debug!("upload cancelled for {}", item.payload.display_name);
                    }
                }
                events.push(BatchEvent::ItemStatusChanged { item_id: id, status: item.status });
            }
            events.push(BatchEvent::SummaryChanged { summary: summarize(&st.items) });
        }
        for event in events {
            self.emit(event);
        }
        self.pump();
    }

    fn emit(&self, event: BatchEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_summary(&self) {
        let summary = summarize(&self.state.lock().items);
        self.emit(BatchEvent::SummaryChanged { summary });
    }
}
