//! Meeting job model and the field-level merge rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote job state of a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Pending,
    Joining,
    Recording,
    Processing,
    Completed,
    Failed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Joining => "joining",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and failed meetings never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub percentage: f64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    /// Seconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Full clipboard form: summary, key points, participants and duration.
    pub fn to_plain_text(&self) -> String {
        let mut lines = self.share_lines();
        lines.push(String::new());
        lines.push(format!("Participants: {}", self.participants.join(", ")));
        lines.push(format!("Duration: {}", format_duration(self.duration)));
        lines.join("\n")
    }

    /// Short form with only the summary and key points.
    pub fn to_share_text(&self) -> String {
        self.share_lines().join("\n")
    }

    fn share_lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.summary.clone(),
            String::new(),
            "Key Points:".to_string(),
        ];
        lines.extend(self.key_points.iter().map(|p| format!("• {}", p)));
        lines
    }
}

/// `125` -> `"2m 5s"`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}m {}s", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    #[serde(default)]
    pub meeting_url: String,
    #[serde(default)]
    pub grant_id: String,
    pub status: MeetingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl Meeting {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Completed but the note has not been attached yet.
    pub fn needs_note(&self) -> bool {
        self.status == MeetingStatus::Completed && self.note.is_none()
    }

    /// Fold a newer server view of this meeting into `self`.
    ///
    /// Incoming values win unless they are absent or empty while the stored
    /// value is present. Once the status is terminal it never changes, and
    /// note/transcript only stick to completed meetings.
    pub fn merge_from(&mut self, incoming: Meeting) {
        debug_assert_eq!(self.id, incoming.id);

        if !self.status.is_terminal() {
            self.status = incoming.status;
        }

        if !incoming.meeting_url.is_empty() {
            self.meeting_url = incoming.meeting_url;
        }
        if !incoming.grant_id.is_empty() {
            self.grant_id = incoming.grant_id;
        }
        if incoming.progress.is_some() {
            self.progress = incoming.progress;
        }
        if incoming.created_at.is_some() {
            self.created_at = incoming.created_at;
        }
        if incoming.updated_at.is_some() {
            self.updated_at = incoming.updated_at;
        }

        if self.status == MeetingStatus::Completed {
            if incoming.note.is_some() {
                self.note = incoming.note;
            }
            if let Some(transcript) = incoming.transcript.filter(|t| !t.is_empty()) {
                self.transcript = Some(transcript);
            }
        }
    }

    /// Normalize a meeting seen for the first time so it obeys the same
    /// invariants `merge_from` maintains.
    pub(crate) fn sanitized(mut self) -> Self {
        if self.status != MeetingStatus::Completed {
            self.note = None;
            self.transcript = None;
        }
        if self.transcript.as_deref() == Some("") {
            self.transcript = None;
        }
        self
    }
}

#[cfg(test)]
pub(crate) fn meeting(id: &str, status: MeetingStatus) -> Meeting {
    Meeting {
        id: id.to_string(),
        meeting_url: format!("https://meet.google.com/{}", id),
        grant_id: "grant-1".to_string(),
        status,
        progress: None,
        created_at: None,
        updated_at: None,
        note: None,
        transcript: None,
    }
}

#[cfg(test)]
pub(crate) fn sample_note(summary: &str) -> Note {
    Note {
        summary: summary.to_string(),
        key_points: vec!["Ship the beta".to_string(), "Hire a designer".to_string()],
        participants: vec!["Ana".to_string(), "Bo".to_string()],
        duration: 125,
        word_count: Some(980),
        generated_at: None,
    }
}
