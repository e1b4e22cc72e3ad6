//! Meeting Store: the one owner of the meeting collection and the selection.
//!
//! Every mutation goes through the merge in [`Meeting::merge_from`], so poll
//! results, note attachments and list refreshes can land in any order
//! without losing fetched data. Status reads, whether a single poll or a
//! whole list, carry per-meeting sequence numbers and only the latest one
//! issued may write. Changes are announced on a `watch` revision
//! counter that the poller and note fetcher subscribe to.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use super::error::{bounded, SyncError, SyncResult};
use super::model::Meeting;
use crate::client::{MeetingNote, MeetingsApi};

/// Handle for one outgoing status fetch. Only the most recently issued
/// ticket for a meeting may apply its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTicket {
    pub id: String,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Front,
    Back,
}

#[derive(Default)]
struct StoreState {
    meetings: Vec<Meeting>,
    selected: Option<String>,
    issued: HashMap<String, u64>,
}

impl StoreState {
    fn issue(&mut self, id: &str) -> u64 {
        let seq = self.issued.entry(id.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    fn is_latest(&self, id: &str, seq: u64) -> bool {
        self.issued.get(id).copied().unwrap_or(0) == seq
    }

    fn contains(&self, id: &str) -> bool {
        self.meetings.iter().any(|m| m.id == id)
    }

    fn merge(&mut self, incoming: Meeting, placement: Placement) -> Meeting {
        if let Some(existing) = self.meetings.iter_mut().find(|m| m.id == incoming.id) {
            existing.merge_from(incoming);
            return existing.clone();
        }

        let meeting = incoming.sanitized();
        match placement {
            Placement::Front => self.meetings.insert(0, meeting.clone()),
            Placement::Back => self.meetings.push(meeting.clone()),
        }
        meeting
    }
}

struct StoreInner {
    state: Mutex<StoreState>,
    api: Arc<dyn MeetingsApi>,
    request_timeout: Duration,
    changes: watch::Sender<u64>,
}

/// Cloneable handle; all clones share one collection.
#[derive(Clone)]
pub struct MeetingStore {
    inner: Arc<StoreInner>,
}

impl MeetingStore {
    pub fn new(api: Arc<dyn MeetingsApi>, request_timeout: Duration) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                api,
                request_timeout,
                changes,
            }),
        }
    }

    pub fn api(&self) -> Arc<dyn MeetingsApi> {
        self.inner.api.clone()
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Receiver that observes a new revision after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.inner.changes.borrow()
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|rev| *rev += 1);
    }

    /// Snapshot in store order.
    pub async fn list(&self) -> Vec<Meeting> {
        self.inner.state.lock().await.meetings.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Meeting> {
        let state = self.inner.state.lock().await;
        state.meetings.iter().find(|m| m.id == id).cloned()
    }

    /// Meetings that have not reached a terminal status.
    pub async fn active(&self) -> Vec<Meeting> {
        let state = self.inner.state.lock().await;
        state
            .meetings
            .iter()
            .filter(|m| m.is_active())
            .cloned()
            .collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.lock().await.meetings.is_empty()
    }

    /// Merge by id; unknown meetings are appended.
    pub async fn upsert(&self, incoming: Meeting) -> Meeting {
        let merged = self
            .inner
            .state
            .lock()
            .await
            .merge(incoming, Placement::Back);
        self.notify();
        merged
    }

    /// Merge a batch under one lock and one change notification. No sequence
    /// check; used to seed a store.
    #[cfg(test)]
    pub(crate) async fn upsert_all(&self, incoming: Vec<Meeting>) {
        if incoming.is_empty() {
            return;
        }
        {
            let mut state = self.inner.state.lock().await;
            for meeting in incoming {
                state.merge(meeting, Placement::Back);
            }
        }
        self.notify();
    }

    /// Reserve the next status sequence number for `id`.
    pub async fn begin_status_fetch(&self, id: &str) -> StatusTicket {
        let mut state = self.inner.state.lock().await;
        let seq = state.issue(id);
        StatusTicket {
            id: id.to_string(),
            seq,
        }
    }

    /// Reserve a status sequence number for every meeting loaded right now,
    /// ahead of a list request.
    async fn begin_list_fetch(&self) -> HashMap<String, u64> {
        let mut state = self.inner.state.lock().await;
        let ids: Vec<String> = state.meetings.iter().map(|m| m.id.clone()).collect();
        ids.into_iter()
            .map(|id| {
                let seq = state.issue(&id);
                (id, seq)
            })
            .collect()
    }

    /// Merge a list response. Entries for meetings that were loaded when the
    /// request went out apply only if their sequence is still the latest.
    /// Unknown ids are added; ids that appeared while the request was in
    /// flight keep their newer view. Returns how many entries were dropped.
    async fn apply_list(&self, tickets: &HashMap<String, u64>, incoming: Vec<Meeting>) -> usize {
        let mut dropped = 0;
        let mut merged = 0;
        {
            let mut state = self.inner.state.lock().await;
            for meeting in incoming {
                let current = match tickets.get(&meeting.id) {
                    Some(&seq) => state.is_latest(&meeting.id, seq),
                    None => !state.contains(&meeting.id),
                };
                if current {
                    state.merge(meeting, Placement::Back);
                    merged += 1;
                } else {
                    debug!("Discarding stale list entry for meeting {}", meeting.id);
                    dropped += 1;
                }
            }
        }
        if merged > 0 {
            self.notify();
        }
        dropped
    }

    /// Apply a status response if its ticket is still the latest issued for
    /// that meeting. Returns `false` when the response was stale and dropped.
    pub async fn apply_status(&self, ticket: &StatusTicket, incoming: Meeting) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            if !state.is_latest(&ticket.id, ticket.seq) || incoming.id != ticket.id {
                debug!(
                    "Discarding stale status for meeting {} (seq {})",
                    ticket.id, ticket.seq
                );
                return false;
            }
            state.merge(incoming, Placement::Back);
        }
        self.notify();
        true
    }

    /// Attach fetched note artifacts to a completed meeting.
    ///
    /// Goes through the same merge as every other write; meetings that are
    /// unknown or not completed are left untouched.
    pub async fn attach_note(&self, id: &str, artifacts: MeetingNote) -> bool {
        {
            let mut state = self.inner.state.lock().await;
            let Some(existing) = state.meetings.iter().find(|m| m.id == id) else {
                return false;
            };
            let mut incoming = existing.clone();
            incoming.note = Some(artifacts.note);
            incoming.transcript = artifacts.transcript;

            let merged = state.merge(incoming, Placement::Back);
            if merged.note.is_none() {
                return false;
            }
        }
        self.notify();
        true
    }

    /// Select a loaded meeting.
    pub async fn select(&self, id: &str) -> SyncResult<Meeting> {
        let meeting = {
            let mut state = self.inner.state.lock().await;
            let meeting = state
                .meetings
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| SyncError::NotFoundLocal(id.to_string()))?;
            if state.selected.as_deref() == Some(id) {
                return Ok(meeting);
            }
            state.selected = Some(id.to_string());
            meeting
        };
        self.notify();
        Ok(meeting)
    }

    pub async fn selected(&self) -> Option<Meeting> {
        let state = self.inner.state.lock().await;
        let id = state.selected.as_deref()?;
        state.meetings.iter().find(|m| m.id == id).cloned()
    }

    pub async fn selected_id(&self) -> Option<String> {
        self.inner.state.lock().await.selected.clone()
    }

    /// Submit a new meeting. Empty fields are rejected before any request.
    pub async fn create(&self, meeting_url: &str, grant_id: &str) -> SyncResult<Meeting> {
        let meeting_url = meeting_url.trim();
        let grant_id = grant_id.trim();
        if meeting_url.is_empty() {
            return Err(SyncError::Validation { field: "meetingUrl" });
        }
        if grant_id.is_empty() {
            return Err(SyncError::Validation { field: "grantId" });
        }

        let created = bounded(
            "create meeting",
            self.inner.request_timeout,
            self.inner.api.create_meeting(meeting_url, grant_id),
        )
        .await?;

        info!("Meeting {} created ({})", created.id, created.status);
        let merged = self
            .inner
            .state
            .lock()
            .await
            .merge(created, Placement::Front);
        self.notify();
        Ok(merged)
    }

    /// Fetch the full list and merge it. On failure the store is unchanged.
    /// Meetings missing from the response are kept, and a status read that
    /// lands while the list is in flight is not rolled back by it.
    pub async fn refresh(&self) -> SyncResult<usize> {
        let tickets = self.begin_list_fetch().await;
        let meetings = bounded(
            "list meetings",
            self.inner.request_timeout,
            self.inner.api.list_meetings(),
        )
        .await?;

        let count = meetings.len();
        let dropped = self.apply_list(&tickets, meetings).await;
        debug!("Loaded {} meetings ({} stale)", count, dropped);
        Ok(count)
    }
}
