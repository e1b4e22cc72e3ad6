//! Selection Synchronizer.
//!
//! The externally visible `id` parameter decides which meeting is shown.
//! This module keeps the store's selection in line with it, picks the first
//! meeting when no id is given, and kicks off note and detail fetches for the
//! meeting that ends up selected.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{bounded, SyncError};
use super::model::Meeting;
use super::note_fetcher::NoteFetcher;
use super::store::MeetingStore;

/// The navigational parameter carrying the selected meeting id.
pub trait SelectionParam: Send + Sync {
    fn current(&self) -> Option<String>;

    /// Overwrite the current value without creating a history entry.
    fn replace(&self, id: &str);

    /// Receiver notified whenever the value changes.
    fn watch(&self) -> watch::Receiver<Option<String>>;
}

/// In-memory navigation history holding the `id` parameter of each entry.
pub struct NavigationParam {
    history: Mutex<Vec<Option<String>>>,
    current: watch::Sender<Option<String>>,
}

impl NavigationParam {
    pub fn new(initial: Option<String>) -> Self {
        let (current, _) = watch::channel(initial.clone());
        Self {
            history: Mutex::new(vec![initial]),
            current,
        }
    }

    /// User navigation: adds a history entry.
    pub fn push(&self, id: Option<String>) {
        if let Ok(mut history) = self.history.lock() {
            history.push(id.clone());
        }
        self.current.send_replace(id);
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl SelectionParam for NavigationParam {
    fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    fn replace(&self, id: &str) {
        if let Ok(mut history) = self.history.lock() {
            match history.last_mut() {
                Some(last) => *last = Some(id.to_string()),
                None => history.push(Some(id.to_string())),
            }
        }
        self.current.send_replace(Some(id.to_string()));
    }

    fn watch(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The external id resolved to a loaded meeting.
    Selected(String),
    /// No external id; the first meeting was picked and written back.
    AutoSelected(String),
    /// No external id and an earlier selection is kept.
    Kept(String),
    /// The external id is not loaded yet.
    Pending(String),
    /// Nothing to select.
    Empty,
}

pub struct SelectionSynchronizer {
    store: MeetingStore,
    notes: NoteFetcher,
    param: Arc<dyn SelectionParam>,
}

impl SelectionSynchronizer {
    pub fn new(store: MeetingStore, notes: NoteFetcher, param: Arc<dyn SelectionParam>) -> Self {
        Self {
            store,
            notes,
            param,
        }
    }

    /// Resolve the external id against the current store contents.
    pub async fn sync(&self) -> SelectionOutcome {
        let previous = self.store.selected_id().await;

        let Some(id) = self.param.current() else {
            return self.select_default(previous).await;
        };

        match self.store.select(&id).await {
            Ok(meeting) => {
                self.after_select(meeting, previous.as_deref() != Some(id.as_str()))
                    .await;
                SelectionOutcome::Selected(id)
            }
            Err(SyncError::NotFoundLocal(_)) => {
                debug!("Selected meeting {} not loaded yet", id);
                SelectionOutcome::Pending(id)
            }
            Err(e) => {
                warn!("Failed to select meeting {}: {}", id, e);
                SelectionOutcome::Pending(id)
            }
        }
    }

    async fn select_default(&self, previous: Option<String>) -> SelectionOutcome {
        if let Some(id) = previous {
            return SelectionOutcome::Kept(id);
        }

        let Some(first) = self.store.list().await.into_iter().next() else {
            return SelectionOutcome::Empty;
        };

        match self.store.select(&first.id).await {
            Ok(meeting) => {
                self.param.replace(&meeting.id);
                let id = meeting.id.clone();
                self.after_select(meeting, true).await;
                SelectionOutcome::AutoSelected(id)
            }
            Err(e) => {
                debug!("Default selection failed: {}", e);
                SelectionOutcome::Empty
            }
        }
    }

    /// Newly selected meetings missing note or transcript get a fresh status
    /// read first. A completed meeting without a note always gets a note fetch.
    async fn after_select(&self, meeting: Meeting, newly_selected: bool) {
        let mut meeting = meeting;

        if newly_selected && (meeting.note.is_none() || meeting.transcript.is_none()) {
            let ticket = self.store.begin_status_fetch(&meeting.id).await;
            let api = self.store.api();
            match bounded(
                "get meeting status",
                self.store.request_timeout(),
                api.get_meeting(&meeting.id),
            )
            .await
            {
                Ok(fresh) => {
                    self.store.apply_status(&ticket, fresh).await;
                    if let Some(current) = self.store.get(&meeting.id).await {
                        meeting = current;
                    }
                }
                Err(e) => warn!("Error fetching meeting {}: {}", meeting.id, e),
            }
        }

        if meeting.needs_note() {
            self.notes.trigger(&meeting.id);
        }
    }

    /// Run [`sync`](Self::sync) unless `cancel` fires first. A dropped sync
    /// leaves its in-flight status read unapplied.
    async fn sync_or_cancel(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.sync() => true,
        }
    }

    /// Re-resolve on every store or parameter change until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut store_changes = self.store.subscribe();
        let mut param_changes = self.param.watch();
        if !self.sync_or_cancel(&cancel).await {
            debug!("Selection synchronizer stopped");
            return;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = store_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = param_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if !self.sync_or_cancel(&cancel).await {
                break;
            }
        }
        debug!("Selection synchronizer stopped");
    }
}
