//! Integration tests against an in-process mock of the meetings service.
//!
//! The mock speaks the same JSON contract as the real backend and advances
//! each meeting one status step per status read.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use notetaker::app::Session;
use notetaker::client::{HttpMeetingsClient, MeetingsApi};
use notetaker::config::Config;
use notetaker::meeting::{MeetingStatus, SyncError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const STEPS: [&str; 5] = ["pending", "joining", "recording", "processing", "completed"];

#[derive(Default)]
struct Mock {
    meetings: Vec<(String, usize)>,
    note_requests: usize,
    regenerations: usize,
}

type Shared = Arc<Mutex<Mock>>;

fn meeting_json(id: &str, step: usize) -> Value {
    json!({
        "id": id,
        "meetingUrl": format!("https://meet.google.com/{}", id),
        "grantId": "grant-1",
        "status": STEPS[step],
        "progress": {"percentage": step * 25, "message": format!("step {}", step)},
        "createdAt": "2026-10-01T09:00:00Z",
        "updatedAt": "2026-10-01T09:00:00Z"
    })
}

fn note_json(summary: &str) -> Value {
    json!({
        "summary": summary,
        "keyPoints": ["Budget approved"],
        "participants": ["Ana", "Bo"],
        "duration": 1830,
        "wordCount": 4200,
        "generatedAt": "2026-10-01T10:00:00Z"
    })
}

async fn create(
    State(mock): State<Shared>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let url = body.get("meetingUrl").and_then(|v| v.as_str()).unwrap_or("");
    if !url.starts_with("https://") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid meeting URL"})),
        ));
    }
    let mut mock = mock.lock().unwrap();
    let id = format!("m{}", mock.meetings.len() + 1);
    mock.meetings.push((id.clone(), 0));
    Ok((StatusCode::CREATED, Json(json!({"meeting": meeting_json(&id, 0)}))))
}

async fn list(State(mock): State<Shared>) -> Json<Value> {
    let mock = mock.lock().unwrap();
    let meetings: Vec<Value> = mock
        .meetings
        .iter()
        .map(|(id, step)| meeting_json(id, *step))
        .collect();
    Json(json!({ "meetings": meetings }))
}

async fn status(
    State(mock): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut mock = mock.lock().unwrap();
    match mock.meetings.iter_mut().find(|(m, _)| *m == id) {
        Some((_, step)) => {
            *step = (*step + 1).min(STEPS.len() - 1);
            Ok(Json(json!({"meeting": meeting_json(&id, *step)})))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Meeting not found"})),
        )),
    }
}

async fn note(State(mock): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    let mut mock = mock.lock().unwrap();
    mock.note_requests += 1;
    Json(json!({"note": note_json(&format!("Notes for {}", id)), "transcript": "Ana: hello"}))
}

async fn regenerate(State(mock): State<Shared>, Path(_id): Path<String>) -> Json<Value> {
    let mut mock = mock.lock().unwrap();
    mock.regenerations += 1;
    Json(json!({"note": note_json("Regenerated summary")}))
}

async fn spawn_mock(mock: Shared) -> String {
    let app = Router::new()
        .route("/api/meetings", post(create).get(list))
        .route("/api/meetings/:id", get(status))
        .route("/api/meetings/:id/note", get(note))
        .route("/api/meetings/:id/regenerate-note", post(regenerate))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.request_timeout_seconds = 5;
    config.polling.interval_seconds = 1;
    config
}

#[tokio::test]
async fn test_client_speaks_rest_contract() {
    let mock = Shared::default();
    let base = spawn_mock(mock.clone()).await;
    let client = HttpMeetingsClient::new(&base, Duration::from_secs(5)).unwrap();

    let created = client
        .create_meeting("https://meet.google.com/abc-defg-hij", "grant-1")
        .await
        .unwrap();
    assert_eq!(created.id, "m1");
    assert_eq!(created.status, MeetingStatus::Pending);

    let listed = client.list_meetings().await.unwrap();
    assert_eq!(listed.len(), 1);

    let status = client.get_meeting("m1").await.unwrap();
    assert_eq!(status.status, MeetingStatus::Joining);
    assert_eq!(status.progress.unwrap().percentage, 25.0);

    let artifacts = client.get_note("m1").await.unwrap();
    assert_eq!(artifacts.note.summary, "Notes for m1");
    assert_eq!(artifacts.note.duration, 1830);
    assert_eq!(artifacts.transcript.as_deref(), Some("Ana: hello"));

    let regenerated = client.regenerate_note("m1").await.unwrap();
    assert_eq!(regenerated.unwrap().summary, "Regenerated summary");
}

#[tokio::test]
async fn test_server_errors_are_readable() {
    let base = spawn_mock(Shared::default()).await;
    let client = HttpMeetingsClient::new(&base, Duration::from_secs(5)).unwrap();

    let err = client.create_meeting("not-a-url", "grant").await.unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("400"), "{}", message);
    assert!(message.contains("Invalid meeting URL"), "{}", message);

    let err = client.get_meeting("missing").await.unwrap_err();
    assert!(format!("{:#}", err).contains("Meeting not found"));
}

#[tokio::test]
async fn test_unreachable_service_is_remote_error() {
    let config = test_config("http://127.0.0.1:9");
    let session = Session::from_config(&config, None).unwrap();

    let err = session.load().await.unwrap_err();
    assert!(err.is_remote());
    assert!(session.store().is_empty().await);
}

#[tokio::test]
async fn test_validation_happens_before_network() {
    let config = test_config("http://127.0.0.1:9");
    let session = Session::from_config(&config, None).unwrap();

    let err = session.create("", "x").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation { field: "meetingUrl" }));
}

#[tokio::test]
async fn test_session_tracks_meeting_to_note() {
    let mock = Shared::default();
    let base = spawn_mock(mock.clone()).await;
    let mut session = Session::from_config(&test_config(&base), None).unwrap();

    assert_eq!(session.start().await.unwrap(), 0);
    let created = session
        .create("https://meet.google.com/abc-defg-hij", "grant-1")
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    loop {
        let meeting = session.store().get(&created.id).await.unwrap();
        if meeting.note.is_some() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "meeting never completed: {:?}",
            meeting.status
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let meeting = session.store().get(&created.id).await.unwrap();
    assert_eq!(meeting.status, MeetingStatus::Completed);
    assert_eq!(meeting.transcript.as_deref(), Some("Ana: hello"));
    assert_eq!(session.store().selected_id().await, Some(created.id.clone()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!session.poller().is_armed());
    assert_eq!(mock.lock().unwrap().note_requests, 1);

    let regenerated = session.regenerate_note(&created.id).await.unwrap();
    assert_eq!(regenerated.unwrap().summary, "Regenerated summary");
    assert_eq!(
        session.store().get(&created.id).await.unwrap().note.unwrap().summary,
        "Regenerated summary"
    );

    session.shutdown().await;
}
