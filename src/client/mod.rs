//! Remote Job Client: typed access to the meetings REST API.
//!
//! The engine only depends on the [`MeetingsApi`] trait; [`HttpMeetingsClient`]
//! is the production implementation over `reqwest`.

mod http;

#[cfg(test)]
pub(crate) mod fake;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::meeting::{Meeting, Note};

pub use http::HttpMeetingsClient;

/// Body of `POST /meetings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub meeting_url: String,
    pub grant_id: String,
}

/// `{meeting: Meeting}` returned by create and get-status.
#[derive(Debug, Deserialize)]
pub struct MeetingResponse {
    pub meeting: Meeting,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeetingListResponse {
    #[serde(default)]
    pub meetings: Vec<Meeting>,
}

/// Note artifacts of a completed meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingNote {
    pub note: Note,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegenerateNoteResponse {
    #[serde(default)]
    pub note: Option<Note>,
}

#[async_trait]
pub trait MeetingsApi: Send + Sync {
    async fn create_meeting(&self, meeting_url: &str, grant_id: &str) -> Result<Meeting>;

    async fn list_meetings(&self) -> Result<Vec<Meeting>>;

    /// Current status of one meeting.
    async fn get_meeting(&self, id: &str) -> Result<Meeting>;

    async fn get_note(&self, id: &str) -> Result<MeetingNote>;

    /// Ask the service to summarize again. `None` when it produced nothing.
    async fn regenerate_note(&self, id: &str) -> Result<Option<Note>>;
}
