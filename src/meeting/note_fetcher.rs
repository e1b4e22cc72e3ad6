//! Note Fetcher.
//!
//! Pulls note and transcript for completed meetings that do not have them
//! yet. At most one request per meeting is outstanding at a time; the
//! marker is taken before the request starts and released when it finishes,
//! fails or is cancelled.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{bounded, SyncError, SyncResult};
use super::model::{MeetingStatus, Note};
use super::store::MeetingStore;
use crate::client::MeetingNote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOutcome {
    Attached,
    /// Another fetch for the same meeting is still running.
    InFlight,
    /// Meeting is not completed or already has its note.
    NotNeeded,
    NotLoaded,
    Failed,
    Cancelled,
}

type InFlight = Arc<Mutex<HashSet<String>>>;

/// Releases the in-flight marker for one meeting when dropped.
struct InFlightGuard {
    set: InFlight,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

#[derive(Clone)]
pub struct NoteFetcher {
    store: MeetingStore,
    in_flight: InFlight,
    cancel: CancellationToken,
}

impl NoteFetcher {
    /// Fetches started by this fetcher stop writing once `cancel` fires.
    pub fn new(store: MeetingStore, cancel: CancellationToken) -> Self {
        Self {
            store,
            in_flight: Arc::default(),
            cancel,
        }
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    fn claim(&self, id: &str) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: self.in_flight.clone(),
            id: id.to_string(),
        })
    }

    /// Fetch the note for `id` now, unless one is already on its way.
    pub async fn fetch(&self, id: &str) -> NoteOutcome {
        match self.claim(id) {
            Some(guard) => self.fetch_claimed(guard).await,
            None => {
                debug!("Note fetch for meeting {} already in flight", id);
                NoteOutcome::InFlight
            }
        }
    }

    /// Start a background fetch for `id`. Returns `None` when one is already running.
    pub fn trigger(&self, id: &str) -> Option<JoinHandle<NoteOutcome>> {
        let guard = self.claim(id)?;
        let fetcher = self.clone();
        Some(tokio::spawn(async move { fetcher.fetch_claimed(guard).await }))
    }

    async fn fetch_claimed(&self, guard: InFlightGuard) -> NoteOutcome {
        let id = guard.id.as_str();
        match self.store.get(id).await {
            None => return NoteOutcome::NotLoaded,
            Some(meeting) if !meeting.needs_note() => return NoteOutcome::NotNeeded,
            Some(_) => {}
        }

        let api = self.store.api();
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return NoteOutcome::Cancelled,
            result = bounded("get meeting note", self.store.request_timeout(), api.get_note(id)) => result,
        };

        match result {
            Ok(artifacts) => {
                if self.cancel.is_cancelled() {
                    return NoteOutcome::Cancelled;
                }
                if self.store.attach_note(id, artifacts).await {
                    info!("Note attached to meeting {}", id);
                    NoteOutcome::Attached
                } else {
                    NoteOutcome::NotNeeded
                }
            }
            Err(e) => {
                warn!("Error fetching note for meeting {}: {}", id, e);
                NoteOutcome::Failed
            }
        }
    }

    /// Trigger a fetch for every completed meeting still missing its note.
    pub async fn observe(&self) -> usize {
        let mut started = 0;
        for meeting in self.store.list().await {
            if meeting.needs_note() && self.trigger(&meeting.id).is_some() {
                started += 1;
            }
        }
        started
    }

    /// Re-check the store after each change until cancelled.
    pub async fn run(self) {
        let mut changes = self.store.subscribe();
        self.observe().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.observe().await;
                }
            }
        }
        debug!("Note fetcher stopped");
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }

    /// Ask the service for a fresh note and store it when one comes back.
    pub async fn regenerate(&self, id: &str) -> SyncResult<Option<Note>> {
        let meeting = self
            .store
            .get(id)
            .await
            .ok_or_else(|| SyncError::NotFoundLocal(id.to_string()))?;
        if meeting.status != MeetingStatus::Completed {
            return Err(SyncError::NotCompleted {
                id: id.to_string(),
                status: meeting.status,
            });
        }

        let api = self.store.api();
        let note = bounded(
            "regenerate note",
            self.store.request_timeout(),
            api.regenerate_note(id),
        )
        .await?;

        match &note {
            Some(note) => {
                self.store
                    .attach_note(
                        id,
                        MeetingNote {
                            note: note.clone(),
                            transcript: None,
                        },
                    )
                    .await;
                info!("Regenerated note for meeting {}", id);
            }
            None => warn!("Regenerating note for meeting {} returned no note", id),
        }
        Ok(note)
    }
}
