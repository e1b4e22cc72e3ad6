use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{
    CreateMeetingRequest, MeetingListResponse, MeetingNote, MeetingResponse, MeetingsApi,
    RegenerateNoteResponse,
};
use crate::meeting::{Meeting, Note};

/// Client for the meetings API rooted at `<base_url>/api`.
pub struct HttpMeetingsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMeetingsClient {
    /// Create a client for the service at `base_url` (without the `/api` prefix).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("{}/api", base_url.trim_end_matches('/')),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `<base>/meetings/<id>[/<action>]`, with the id percent-encoded as one
    /// path segment.
    fn meeting_url(&self, id: &str, action: Option<&str>) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.url("/meetings"))
            .with_context(|| format!("Invalid API base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base URL cannot carry a path: {}", self.base_url))?
            .push(id)
            .extend(action);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {}", what))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!(
                "Failed to {} ({}): {}",
                what,
                status,
                error_message(&body)
            ));
        }

        serde_json::from_str(&body).with_context(|| format!("Failed to parse {} response", what))
    }
}

/// Prefer the server's `error`/`message` field over the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["error", "message"]
                .iter()
                .find_map(|key| json.get(key).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl MeetingsApi for HttpMeetingsClient {
    async fn create_meeting(&self, meeting_url: &str, grant_id: &str) -> Result<Meeting> {
        let body = CreateMeetingRequest {
            meeting_url: meeting_url.to_string(),
            grant_id: grant_id.to_string(),
        };
        let response: MeetingResponse = self
            .read(self.client.post(self.url("/meetings")).json(&body), "create meeting")
            .await?;
        debug!("Created meeting {}", response.meeting.id);
        Ok(response.meeting)
    }

    async fn list_meetings(&self) -> Result<Vec<Meeting>> {
        let response: MeetingListResponse = self
            .read(self.client.get(self.url("/meetings")), "list meetings")
            .await?;
        Ok(response.meetings)
    }

    async fn get_meeting(&self, id: &str) -> Result<Meeting> {
        let url = self.meeting_url(id, None)?;
        let response: MeetingResponse = self.read(self.client.get(url), "get meeting status").await?;
        Ok(response.meeting)
    }

    async fn get_note(&self, id: &str) -> Result<MeetingNote> {
        let url = self.meeting_url(id, Some("note"))?;
        self.read(self.client.get(url), "get meeting note").await
    }

    async fn regenerate_note(&self, id: &str) -> Result<Option<Note>> {
        let url = self.meeting_url(id, Some("regenerate-note"))?;
        let response: RegenerateNoteResponse =
            self.read(self.client.post(url), "regenerate note").await?;
        Ok(response.note)
    }
}
