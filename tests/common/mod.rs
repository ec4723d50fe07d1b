// Common test utilities and fixtures

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Variables that would leak host configuration into the binary under test
const HOST_ENV: &[&str] = &[
    "AI_PROVIDER",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "OPENAI_BASE_URL",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_MODEL",
    "ANTHROPIC_BASE_URL",
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_DEPLOYMENT",
    "AZURE_OPENAI_API_VERSION",
    "BROWSER_TYPE",
    "HEADLESS",
    "TIMEOUT",
    "VIEWPORT",
    "CACHE_FILE",
    "BASE_URL",
    "LOG_LEVEL",
    "RUST_LOG",
];

/// Test fixtures
pub mod fixtures {
    pub const LOGIN_FEATURE: &str = r#"@auth
Feature: User login

  Background:
    Given I navigate to "http://shop.test/login"

  @smoke
  Scenario: Successful login
    When I enter "user@shop.test" into the "Email" field
    And I enter "secret" into the "Password" field
    And I click the "Login" button
    Then I should see "Welcome back"

  Scenario Outline: Rejected login
    When I enter "<email>" into the "Email" field
    And I click the "Login" button
    Then I should see "<message>"

    Examples:
      | email        | message         |
      | bad@shop     | Invalid email   |
      | nobody@x.com | Unknown account |
"#;

    /// Model reply naming a single CSS selector
    pub const ANALYSIS_REPLY: &str = r##"{
        "selectors": [
            {"selector": "#login", "type": "css", "confidence": 0.95, "reasoning": "unique id"}
        ],
        "best_selector": "#login",
        "success": true,
        "error": null
    }"##;
}

/// Temp working directory holding `login.feature`
pub fn workspace(feature: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("login.feature");
    std::fs::write(&path, feature).expect("Failed to write feature file");
    (dir, path)
}

pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CliOutput {
    pub fn json(&self) -> Value {
        serde_json::from_str(self.stdout.trim())
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", self.stdout))
    }
}

/// Run the binary inside `dir` with host configuration stripped
pub fn run_cli(dir: &TempDir, args: &[&str]) -> CliOutput {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cukeprobe"));
    cmd.current_dir(dir.path()).args(args).arg("--no-log-file");
    for var in HOST_ENV {
        cmd.env_remove(var);
    }

    let output = cmd.output().expect("Failed to run cukeprobe");
    CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

/// A request seen by the mock AI server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Clone)]
struct MockState {
    reply: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockState {
    fn record(&self, uri: &Uri, headers: HeaderMap, body: Value) {
        self.requests.lock().unwrap().push(RecordedRequest {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        });
    }
}

/// Stand-in for the OpenAI, Azure OpenAI and Anthropic completion APIs
pub struct MockAiServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockAiServer {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn chat_completion_body(reply: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": reply },
            "finish_reason": "stop"
        }]
    })
}

async fn chat_completion(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&uri, headers, body);
    Json(chat_completion_body(&state.reply))
}

async fn azure_completion(
    State(state): State<MockState>,
    Path(_deployment): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&uri, headers, body);
    Json(chat_completion_body(&state.reply))
}

async fn anthropic_message(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&uri, headers, body);
    Json(json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [
            { "type": "text", "text": state.reply }
        ],
        "stop_reason": "end_turn"
    }))
}

async fn rate_limited(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    state.record(&uri, headers, body);
    (
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error": {"message": "slow down"}}"#.to_string(),
    )
}

async fn empty_completion(
    State(state): State<MockState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(&uri, headers, body);
    Json(chat_completion_body(""))
}

/// Start the mock on an ephemeral port, answering every completion with `reply`
///
/// Routes: `/v1/chat/completions` (OpenAI), `/openai/deployments/{dep}/chat/completions`
/// (Azure), `/v1/messages` (Anthropic), `/busy/chat/completions` (HTTP 429) and
/// `/empty/chat/completions` (blank completion).
pub async fn start_mock_ai(reply: &str) -> MockAiServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        reply: reply.to_string(),
        requests: requests.clone(),
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completion))
        .route(
            "/openai/deployments/:deployment/chat/completions",
            post(azure_completion),
        )
        .route("/v1/messages", post(anthropic_message))
        .route("/busy/chat/completions", post(rate_limited))
        .route("/empty/chat/completions", post(empty_completion))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server failed");
    });

    MockAiServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}
