//! Scripted in-memory [`MeetingsApi`] for engine tests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::{MeetingNote, MeetingsApi};
use crate::meeting::{Meeting, MeetingStatus, Note};

#[derive(Debug, Default, Clone)]
pub(crate) struct Calls {
    pub create: usize,
    pub list: usize,
    pub get: Vec<String>,
    pub note: Vec<String>,
    pub regenerate: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    meetings: Vec<Meeting>,
    notes: HashMap<String, MeetingNote>,
    regenerated: HashMap<String, Note>,
    failing_get: HashSet<String>,
    note_failures: usize,
    fail_create: bool,
    fail_list: bool,
    get_delay: Duration,
    get_delays: HashMap<String, VecDeque<Duration>>,
    list_delay: Duration,
    note_delay: Duration,
    next_id: usize,
    calls: Calls,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn with_meetings(meetings: Vec<Meeting>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().meetings = meetings;
        api
    }

    pub fn set_status(&self, id: &str, status: MeetingStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(m) = state.meetings.iter_mut().find(|m| m.id == id) {
            m.status = status;
        }
    }

    pub fn set_note(&self, id: &str, note: Note, transcript: &str) {
        self.state.lock().unwrap().notes.insert(
            id.to_string(),
            MeetingNote {
                note,
                transcript: Some(transcript.to_string()),
            },
        );
    }

    pub fn set_regenerated(&self, id: &str, note: Note) {
        self.state
            .lock()
            .unwrap()
            .regenerated
            .insert(id.to_string(), note);
    }

    pub fn fail_get(&self, id: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing_get.insert(id.to_string());
        } else {
            state.failing_get.remove(id);
        }
    }

    /// The next `n` note fetches fail.
    pub fn fail_next_notes(&self, n: usize) {
        self.state.lock().unwrap().note_failures = n;
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn set_get_delay(&self, delay: Duration) {
        self.state.lock().unwrap().get_delay = delay;
    }

    /// Delay only the next status read of `id`, ahead of the shared delay.
    pub fn delay_next_get(&self, id: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .get_delays
            .entry(id.to_string())
            .or_default()
            .push_back(delay);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().unwrap().list_delay = delay;
    }

    pub fn set_note_delay(&self, delay: Duration) {
        self.state.lock().unwrap().note_delay = delay;
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl MeetingsApi for FakeApi {
    async fn create_meeting(&self, meeting_url: &str, grant_id: &str) -> Result<Meeting> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        if state.fail_create {
            bail!("Failed to create meeting (500): Invalid grant");
        }
        state.next_id += 1;
        let meeting = Meeting {
            id: format!("new-{}", state.next_id),
            meeting_url: meeting_url.to_string(),
            grant_id: grant_id.to_string(),
            status: MeetingStatus::Pending,
            progress: None,
            created_at: None,
            updated_at: None,
            note: None,
            transcript: None,
        };
        state.meetings.insert(0, meeting.clone());
        Ok(meeting)
    }

    // Reads answer with the state at call time; the delay only holds the
    // response back, like a slow network.
    async fn list_meetings(&self) -> Result<Vec<Meeting>> {
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.list += 1;
            let result = if state.fail_list {
                Err(anyhow!("Failed to list meetings: connection refused"))
            } else {
                Ok(state.meetings.clone())
            };
            (result, state.list_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn get_meeting(&self, id: &str) -> Result<Meeting> {
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.get.push(id.to_string());
            let delay = state
                .get_delays
                .get_mut(id)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(state.get_delay);
            let result = if state.failing_get.contains(id) {
                Err(anyhow!("Failed to get meeting status (503): unavailable"))
            } else {
                match state.meetings.iter().find(|m| m.id == id) {
                    Some(m) => Ok(m.clone()),
                    None => Err(anyhow!("Failed to get meeting status (404): Meeting not found")),
                }
            };
            (result, delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn get_note(&self, id: &str) -> Result<MeetingNote> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.note.push(id.to_string());
            state.note_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.note_failures > 0 {
            state.note_failures -= 1;
            bail!("Failed to get meeting note (404): Note not ready");
        }
        match state.notes.get(id) {
            Some(note) => Ok(note.clone()),
            None => bail!("Failed to get meeting note (404): Note not found"),
        }
    }

    async fn regenerate_note(&self, id: &str) -> Result<Option<Note>> {
        let mut state = self.state.lock().unwrap();
        state.calls.regenerate.push(id.to_string());
        Ok(state.regenerated.get(id).cloned())
    }
}
