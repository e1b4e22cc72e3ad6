//! Composition root: wires one client into the store, poller, note fetcher
//! and selection synchronizer, and owns their background tasks.

use crate::client::{HttpMeetingsClient, MeetingsApi};
use crate::config::Config;
use crate::meeting::{
    ActiveSetPoller, Meeting, MeetingStore, NavigationParam, Note, NoteFetcher, SelectionOutcome,
    SelectionSynchronizer, SyncResult,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Session {
    store: MeetingStore,
    poller: ActiveSetPoller,
    notes: NoteFetcher,
    selection: Arc<SelectionSynchronizer>,
    param: Arc<NavigationParam>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn new(api: Arc<dyn MeetingsApi>, config: &Config, selected: Option<String>) -> Self {
        let store = MeetingStore::new(api, config.api.request_timeout());
        let cancel = CancellationToken::new();
        let poller = ActiveSetPoller::new(store.clone(), config.polling.interval());
        let notes = NoteFetcher::new(store.clone(), cancel.clone());
        let param = Arc::new(NavigationParam::new(selected));
        let selection = Arc::new(SelectionSynchronizer::new(
            store.clone(),
            notes.clone(),
            param.clone(),
        ));

        Self {
            store,
            poller,
            notes,
            selection,
            param,
            cancel,
            tasks: Vec::new(),
        }
    }

    /// Session against the HTTP API configured in `config`.
    pub fn from_config(config: &Config, selected: Option<String>) -> Result<Self> {
        let client = HttpMeetingsClient::new(&config.api.base_url, config.api.request_timeout())?;
        info!("Using meetings API at {}", client.base_url());
        Ok(Self::new(Arc::new(client), config, selected))
    }

    pub fn store(&self) -> &MeetingStore {
        &self.store
    }

    pub fn poller(&self) -> &ActiveSetPoller {
        &self.poller
    }

    pub fn notes(&self) -> &NoteFetcher {
        &self.notes
    }

    pub fn param(&self) -> &NavigationParam {
        &self.param
    }

    /// Initial list load.
    pub async fn load(&self) -> SyncResult<usize> {
        self.store.refresh().await
    }

    /// Load, then start polling, note fetching and selection tracking.
    ///
    /// Background tasks start even if the load fails so a later `create` or
    /// `refresh` still gets tracked; the load error is returned to the caller.
    pub async fn start(&mut self) -> SyncResult<usize> {
        let loaded = self.load().await;
        if let Err(e) = &loaded {
            warn!("Initial meeting load failed: {}", e);
        }

        if self.tasks.is_empty() {
            self.tasks.push(self.poller.spawn(self.cancel.clone()));
            self.tasks.push(self.notes.spawn());
            self.tasks.push(tokio::spawn(
                self.selection.clone().run(self.cancel.clone()),
            ));
        }
        loaded
    }

    pub async fn create(&self, meeting_url: &str, grant_id: &str) -> SyncResult<Meeting> {
        self.store.create(meeting_url, grant_id).await
    }

    pub async fn refresh(&self) -> SyncResult<usize> {
        self.store.refresh().await
    }

    /// Resolve the selection now instead of waiting for the background task.
    pub async fn sync_selection(&self) -> SelectionOutcome {
        self.selection.sync().await
    }

    /// User navigation to another meeting (or to none).
    pub fn navigate(&self, id: Option<String>) {
        self.param.push(id);
    }

    pub async fn regenerate_note(&self, id: &str) -> SyncResult<Option<Note>> {
        self.notes.regenerate(id).await
    }

    /// Wait until no note fetch is outstanding, or `limit` passes.
    pub async fn settle_notes(&self, limit: Duration) {
        let deadline = tokio::time::Instant::now() + limit;
        while self.notes.has_in_flight() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Stop background work and wait for it to finish. Nothing writes to the
    /// store afterwards.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
