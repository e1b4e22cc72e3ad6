//! CLI handlers for meeting commands.
//!
//! Every command drives the same sync engine the dashboard uses, through a
//! [`Session`] built from the resolved config.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::time::Duration;

use crate::app::Session;
use crate::cli::args::{AddCliArgs, RegenerateCliArgs, ShowCliArgs, WatchCliArgs};
use crate::config::Config;
use crate::meeting::{Meeting, MeetingStatus, SelectionOutcome};

const LOAD_HINT: &str = "Failed to load meetings. Make sure the backend is running.";

pub async fn handle_add_command(config: &Config, args: AddCliArgs) -> Result<()> {
    let session = Session::from_config(config, None)?;
    let meeting = session.create(&args.url, &args.grant).await?;

    println!("Meeting added (id: {}, status: {})", meeting.id, meeting.status);
    println!("Follow it with: notetaker watch --id {}", meeting.id);
    Ok(())
}

pub async fn handle_list_command(config: &Config) -> Result<()> {
    let session = Session::from_config(config, None)?;
    session.load().await.context(LOAD_HINT)?;

    let meetings = session.store().list().await;
    if meetings.is_empty() {
        println!("No meetings yet. Add one with: notetaker add --url <URL> --grant <ID>");
        return Ok(());
    }

    for meeting in &meetings {
        println!("{}", format_meeting_line(meeting));
    }
    Ok(())
}

pub async fn handle_show_command(config: &Config, args: ShowCliArgs) -> Result<()> {
    let session = Session::from_config(config, args.id.clone())?;
    session.load().await.context(LOAD_HINT)?;

    match session.sync_selection().await {
        SelectionOutcome::Pending(id) => bail!("Meeting not found: {}", id),
        SelectionOutcome::Empty => {
            println!("No meeting selected. Add one with: notetaker add --url <URL> --grant <ID>");
            return Ok(());
        }
        _ => {}
    }

    session.settle_notes(config.api.request_timeout()).await;
    let meeting = session
        .store()
        .selected()
        .await
        .context("Selected meeting disappeared")?;

    println!("{}", format_meeting_detail(&meeting, args.transcript, args.short));
    Ok(())
}

pub async fn handle_regenerate_command(config: &Config, args: RegenerateCliArgs) -> Result<()> {
    let session = Session::from_config(config, Some(args.id.clone()))?;
    session.load().await.context(LOAD_HINT)?;

    match session.regenerate_note(&args.id).await? {
        Some(note) => {
            println!("Note regenerated for meeting {}\n", args.id);
            println!("{}", note.to_plain_text());
        }
        None => println!("The service did not return a new note for meeting {}", args.id),
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    status: MeetingStatus,
    percentage: Option<u32>,
    has_note: bool,
}

impl Snapshot {
    fn of(meeting: &Meeting) -> Self {
        Self {
            status: meeting.status,
            percentage: meeting
                .progress
                .as_ref()
                .map(|p| p.percentage.clamp(0.0, 100.0).round() as u32),
            has_note: meeting.note.is_some(),
        }
    }
}

/// Lines describing what changed since `seen`, which is updated in place.
fn describe_changes(meetings: &[Meeting], seen: &mut HashMap<String, Snapshot>) -> Vec<String> {
    let mut lines = Vec::new();
    for meeting in meetings {
        let now = Snapshot::of(meeting);
        let before = seen.insert(meeting.id.clone(), now.clone());

        match before {
            None => lines.push(format_meeting_line(meeting)),
            Some(before) => {
                if before.status != now.status || before.percentage != now.percentage {
                    lines.push(format!(
                        "#{} {} -> {}{}",
                        meeting.id,
                        before.status,
                        now.status,
                        progress_suffix(meeting)
                    ));
                }
                if !before.has_note && now.has_note {
                    lines.push(format!("#{} note ready", meeting.id));
                }
            }
        }
    }
    lines
}

pub async fn handle_watch_command(config: &Config, args: WatchCliArgs) -> Result<()> {
    let mut session = Session::from_config(config, args.id.clone())?;
    session.start().await.context(LOAD_HINT)?;

    let mut changes = session.store().subscribe();
    let mut seen = HashMap::new();
    let mut idle_rounds = 0;

    loop {
        for line in describe_changes(&session.store().list().await, &mut seen) {
            println!("{}", line);
        }

        let finished =
            session.store().active().await.is_empty() && !session.notes().has_in_flight();
        idle_rounds = if finished { idle_rounds + 1 } else { 0 };
        if idle_rounds >= 2 {
            println!("All meetings finished.");
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped watching.");
                break;
            }
            _ = changes.changed() => {}
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }

    session.shutdown().await;

    if let Some(meeting) = session.store().selected().await {
        println!("\n{}", format_meeting_detail(&meeting, false, false));
    }
    Ok(())
}

fn progress_suffix(meeting: &Meeting) -> String {
    match &meeting.progress {
        Some(p) if !meeting.status.is_terminal() => {
            if p.message.is_empty() {
                format!(" ({:.0}%)", p.percentage)
            } else {
                format!(" ({:.0}% {})", p.percentage, p.message)
            }
        }
        _ => String::new(),
    }
}

pub fn format_meeting_line(meeting: &Meeting) -> String {
    format!(
        "#{} [{}] {}{}",
        meeting.id,
        meeting.status,
        meeting.meeting_url,
        progress_suffix(meeting)
    )
}

pub fn format_meeting_detail(meeting: &Meeting, transcript: bool, short: bool) -> String {
    let mut out = vec![
        format!("Meeting #{}", meeting.id),
        format!("URL: {}", meeting.meeting_url),
        format!("Status: {}", meeting.status),
    ];

    if let Some(progress) = meeting.progress.as_ref().filter(|_| !meeting.status.is_terminal()) {
        out.push(format!(
            "Progress: {:.0}% {}",
            progress.percentage, progress.message
        ));
    }
    if let Some(created) = meeting.created_at {
        out.push(format!("Created: {}", created.format("%Y-%m-%d %H:%M")));
    }

    match (&meeting.note, meeting.status) {
        (Some(note), _) => {
            out.push(String::new());
            out.push(if short {
                note.to_share_text()
            } else {
                note.to_plain_text()
            });
            if let Some(words) = note.word_count {
                if !short {
                    out.push(format!("Words: {}", words));
                }
            }
        }
        (None, MeetingStatus::Completed) => out.push("Note not available yet".to_string()),
        (None, MeetingStatus::Failed) => out.push("Processing failed, no note".to_string()),
        (None, _) => out.push("Note will be generated when processing completes".to_string()),
    }

    if transcript {
        if let Some(text) = &meeting.transcript {
            out.push(format!("\n--- Transcript ---\n{}", text));
        }
    }

    out.join("\n")
}
