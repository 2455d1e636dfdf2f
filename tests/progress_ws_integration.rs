//! Integration tests for the session REST routes and the progress WebSocket.
//!
//! Each test spins up an Axum server on a random port with stub
//! collaborators, drives it over HTTP, and observes progress via
//! tokio-tungstenite.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use paper_notes::collaborators::{ExportOptions, NoteExporter, Summarizer, Transcriber};
use paper_notes::config::{PipelineConfig, UploadConfig};
use paper_notes::error::{ExportError, SummarizationError, TranscriptionError};
use paper_notes::http::router;
use paper_notes::orchestrator::ProgressOrchestrator;
use paper_notes::pipeline::{JobDeps, JobDriver};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

struct StubTranscriber;

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        _source: &Path,
        _prompt: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        Ok("we discuss attention".to_string())
    }
}

struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _transcript: &str, _title: &str) -> Result<String, SummarizationError> {
        Err(SummarizationError::RemoteService {
            status: 503,
            body: "overloaded".to_string(),
        })
    }
}

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, transcript: &str, title: &str) -> Result<String, SummarizationError> {
        Ok(format!("## {title}\n{transcript}"))
    }
}

/// Holds the job in the summarizing stage until released.
struct GatedSummarizer {
    release: Arc<Notify>,
}

#[async_trait]
impl Summarizer for GatedSummarizer {
    async fn summarize(&self, transcript: &str, title: &str) -> Result<String, SummarizationError> {
        self.release.notified().await;
        Ok(format!("## {title}\n{transcript}"))
    }
}

struct StubExporter;

impl NoteExporter for StubExporter {
    fn build_export_target(
        &self,
        title: &str,
        _content: &str,
        _options: &ExportOptions,
    ) -> Result<String, ExportError> {
        Ok(format!("obsidian://new?file={title}"))
    }
}

struct Server {
    port: u16,
    orchestrator: Arc<ProgressOrchestrator>,
    _dir: tempfile::TempDir,
    audio: std::path::PathBuf,
}

impl Server {
    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    fn ws_url(&self, id: &str) -> String {
        format!("ws://127.0.0.1:{}/ws/{id}", self.port)
    }

    async fn create_session(&self, id: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url("/api/sessions"))
            .json(&serde_json::json!({
                "source_path": self.audio,
                "title": "Attention",
                "session_id": id,
            }))
            .send()
            .await
            .unwrap()
    }
}

/// Start an Axum server on a random port.
async fn start_server(summarizer: Arc<dyn Summarizer>) -> Server {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("episode.mp3");
    std::fs::write(&audio, b"fake audio").unwrap();

    let orchestrator = ProgressOrchestrator::new();
    let driver = JobDriver::new(JobDeps {
        orchestrator: Arc::clone(&orchestrator),
        transcriber: Arc::new(StubTranscriber),
        summarizer,
        exporter: Arc::new(StubExporter),
        config: PipelineConfig {
            export_pause: Duration::ZERO,
        },
    });
    let uploads = UploadConfig {
        upload_dir: dir.path().to_string_lossy().into_owned(),
        ..UploadConfig::default()
    };
    let app = router(driver, uploads, false);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Server {
        port,
        orchestrator,
        _dir: dir,
        audio,
    }
}

async fn start_processing(server: &Server, id: &str) {
    let resp = reqwest::Client::new()
        .post(server.url(&format!("/api/process/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
}

/// Poll until an observer is (or is no longer) attached for `id`.
async fn wait_for_observer(server: &Server, id: &str, attached: bool) {
    while server.orchestrator.has_observer(id).await != attached {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

#[tokio::test]
async fn ws_connect_receives_confirmation() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        assert_eq!(server.create_session("A").await.status(), 201);

        let (mut ws, _) = connect_async(server.ws_url("A")).await.expect("WS connect failed");

        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["job_id"], "A");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["progress_percentage"], 0);
        assert_eq!(json["message"], "Connected");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn full_pipeline_streams_progress() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        server.create_session("A").await;

        let (mut ws, _) = connect_async(server.ws_url("A")).await.unwrap();
        let _connected = ws.next().await.unwrap().unwrap();

        let resp = reqwest::Client::new()
            .post(server.url("/api/process/A"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);

        let mut progress = Vec::new();
        loop {
            let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
            progress.push(json["progress_percentage"].as_u64().unwrap());
            if json["status"] == "completed" {
                assert_eq!(json["data"]["export_locator"], "obsidian://new?file=Attention");
                break;
            }
        }
        assert_eq!(progress, vec![10, 25, 30, 50, 75, 100]);

        let result: Value = reqwest::get(server.url("/api/result/A"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(result["status"], "completed");
        assert_eq!(result["transcript"], "we discuss attention");
        assert_eq!(result["summary"], "## Attention\nwe discuss attention");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn summarization_failure_is_reported_over_ws() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(FailingSummarizer)).await;
        server.create_session("A").await;

        let (mut ws, _) = connect_async(server.ws_url("A")).await.unwrap();
        let _connected = ws.next().await.unwrap().unwrap();

        reqwest::Client::new()
            .post(server.url("/api/process/A"))
            .send()
            .await
            .unwrap();

        let last = loop {
            let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
            if json["status"] == "error" {
                break json;
            }
        };
        assert_eq!(last["progress_percentage"], 0);
        assert!(last["message"].as_str().unwrap().contains("overloaded"));

        let session = server.orchestrator.get_session("A").await.unwrap();
        assert_eq!(session.results.transcript.as_deref(), Some("we discuss attention"));
        assert!(session.results.summary.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reconnect_replaces_previous_socket() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        server.create_session("A").await;

        let (mut first, _) = connect_async(server.ws_url("A")).await.unwrap();
        let _ = first.next().await.unwrap().unwrap();

        let (mut second, _) = connect_async(server.ws_url("A")).await.unwrap();
        let _ = second.next().await.unwrap().unwrap();

        // The replaced socket is closed by the server.
        assert!(matches!(
            first.next().await,
            None | Some(Err(_)) | Some(Ok(Message::Close(_)))
        ));

        drop(first);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.orchestrator.has_observer("A").await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        let client = reqwest::Client::new();

        let resp = client.post(server.url("/api/process/ghost")).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client.get(server.url("/api/result/ghost")).send().await.unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;

        let resp = reqwest::Client::new()
            .post(server.url("/api/sessions"))
            .json(&serde_json::json!({"source_path": "/tmp/notes.txt"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn cleanup_removes_session_and_file() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        server.create_session("A").await;
        let client = reqwest::Client::new();

        for _ in 0..2 {
            let resp = client.delete(server.url("/api/sessions/A")).send().await.unwrap();
            assert_eq!(resp.status(), 200);
        }

        assert!(server.orchestrator.get_session("A").await.is_none());
        assert!(!server.audio.exists());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn source_outside_upload_dir_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        let elsewhere = tempfile::tempdir().unwrap();
        let foreign = elsewhere.path().join("user_music.mp3");
        std::fs::write(&foreign, b"not ours").unwrap();
        let client = reqwest::Client::new();

        let resp = client
            .post(server.url("/api/sessions"))
            .json(&serde_json::json!({"source_path": foreign, "session_id": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        // Both temp dirs share a parent, so `..` walks out of the upload dir.
        let escape = server
            .audio
            .parent()
            .unwrap()
            .join("..")
            .join(elsewhere.path().file_name().unwrap())
            .join("user_music.mp3");
        let resp = client
            .post(server.url("/api/sessions"))
            .json(&serde_json::json!({"source_path": escape, "session_id": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client.delete(server.url("/api/sessions/x")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(foreign.exists());
        assert!(server.orchestrator.get_session("x").await.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn health_reports_api_key_state() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;

        let health: Value = reqwest::get(server.url("/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["api_key_configured"], false);
        assert_eq!(health["services"]["export"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reattach_mid_job_resumes_live_progress() {
    timeout(TEST_TIMEOUT, async {
        let release = Arc::new(Notify::new());
        let server = start_server(Arc::new(GatedSummarizer {
            release: Arc::clone(&release),
        }))
        .await;
        server.create_session("A").await;

        let (mut ws, _) = connect_async(server.ws_url("A")).await.unwrap();
        let _connected = ws.next().await.unwrap().unwrap();
        start_processing(&server, "A").await;

        loop {
            let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
            if json["progress_percentage"] == 30 {
                assert_eq!(json["status"], "summarizing");
                break;
            }
        }
        ws.close(None).await.unwrap();
        drop(ws);
        wait_for_observer(&server, "A", false).await;

        let (mut ws, _) = connect_async(server.ws_url("A")).await.unwrap();
        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["status"], "summarizing");
        assert_eq!(json["progress_percentage"], 0);
        assert_eq!(json["message"], "Connected");

        release.notify_one();

        let mut progress = Vec::new();
        loop {
            let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
            progress.push(json["progress_percentage"].as_u64().unwrap());
            if json["status"] == "completed" {
                break;
            }
        }
        assert_eq!(progress, vec![50, 75, 100]);

        let session = server.orchestrator.get_session("A").await.unwrap();
        assert_eq!(session.progress, 100);
        assert_eq!(
            session.results.summary.as_deref(),
            Some("## Attention\nwe discuss attention")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn attach_after_completion_gets_only_confirmation() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(EchoSummarizer)).await;
        server.create_session("A").await;
        start_processing(&server, "A").await;

        loop {
            let session = server.orchestrator.get_session("A").await.unwrap();
            if session.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let (mut ws, _) = connect_async(server.ws_url("A")).await.unwrap();
        let json = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(json["status"], "completed");
        assert_eq!(json["progress_percentage"], 0);
        assert_eq!(json["message"], "Connected");

        // Earlier events are not replayed.
        assert!(
            tokio::time::timeout(Duration::from_millis(200), ws.next())
                .await
                .is_err()
        );
    })
    .await
    .expect("test timed out");
}
