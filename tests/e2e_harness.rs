#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    routing::post,
};
use serde_json::{Value, json};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const CALLBACK_TOKEN: &str = "e2e-callback-token";
pub const EXECUTION_ENDPOINT: &str = "http://executor.test:11434/v1";

/// Env vars the service reads; cleared so the host environment cannot leak in.
const SERVICE_ENV: &[&str] = &[
    "AGENT_HOST",
    "AGENT_PORT",
    "FLASK_RUN_PORT",
    "EXECUTION_ENDPOINT",
    "OLLAMA_BASE_URL",
    "AGENT_RESULT_TOKEN",
    "AGENT_DB_PATH",
    "INNGEST_APP_ID",
    "INNGEST_EVENT_API_BASE_URL",
    "INNGEST_EVENT_KEY",
    "INNGEST_SIGNING_KEY",
    "INNGEST_TIMEOUT_SECS",
    "INNGEST_DEV",
    "AGENT_STRICT_TRANSITIONS",
    "AGENT_LOG_FILE",
];

pub struct RelayHarness {
    child: Child,
    pub api_base: String,
    data_dir: tempfile::TempDir,
    log_path: PathBuf,
}

impl RelayHarness {
    pub async fn spawn(broker_base: &str) -> TestResult<Self> {
        let api_port = find_free_port()?;
        let data_dir = tempfile::tempdir()?;
        let log_path = data_dir.path().join(format!("relay-{}.log", api_port));
        let log_file = std::fs::File::create(&log_path)?;
        let log_file_err = log_file.try_clone()?;

        let mut cmd = service_command(data_dir.path(), broker_base)?;
        let child = cmd
            .arg("serve")
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(api_port.to_string())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()?;

        let mut harness = Self {
            child,
            api_base: format!("http://127.0.0.1:{}", api_port),
            data_dir,
            log_path,
        };
        harness.wait_until_ready().await?;
        Ok(harness)
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn logs(&self) -> String {
        std::fs::read_to_string(&self.log_path).unwrap_or_default()
    }

    async fn wait_until_ready(&mut self) -> TestResult<()> {
        for _ in 0..80 {
            if let Some(status) = self.child.try_wait()? {
                return Err(format!(
                    "agent-relay exited early with status {}: {}",
                    status,
                    self.logs()
                )
                .into());
            }

            let res = reqwest::Client::new()
                .get(format!("{}/healthz", self.api_base))
                .timeout(Duration::from_millis(700))
                .send()
                .await;
            if let Ok(resp) = res
                && resp.status().is_success()
            {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        Err("Timed out waiting for agent-relay readiness".into())
    }

    /// Send a request and return the status with the JSON body (`null` when
    /// the body is empty or not JSON).
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResult<(u16, Value)> {
        let mut req = reqwest::Client::new()
            .request(method, format!("{}{}", self.api_base, path))
            .timeout(Duration::from_secs(15));
        if let Some(payload) = body {
            req = req.json(&payload);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        Ok((status, serde_json::from_str(&text).unwrap_or(Value::Null)))
    }

    pub async fn create(&self, prompt: &str) -> TestResult<(u16, Value)> {
        self.request(
            reqwest::Method::POST,
            "/api/agent",
            Some(json!({ "prompt": prompt })),
            None,
        )
        .await
    }

    pub async fn fetch(&self, request_id: &str) -> TestResult<(u16, Value)> {
        self.request(
            reqwest::Method::GET,
            &format!("/api/agent/{}", request_id),
            None,
            None,
        )
        .await
    }

    pub async fn report(&self, body: Value, token: Option<&str>) -> TestResult<(u16, Value)> {
        self.request(
            reqwest::Method::POST,
            "/internal/agent-result",
            Some(body),
            token,
        )
        .await
    }
}

impl Drop for RelayHarness {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// `agent-relay` with a clean, test-controlled environment.
pub fn service_command(data_dir: &Path, broker_base: &str) -> TestResult<Command> {
    let mut cmd = Command::new(relay_binary_path()?);
    for key in SERVICE_ENV {
        cmd.env_remove(key);
    }
    cmd.env("AGENT_DB_PATH", data_dir.join("agent_requests.db"))
        .env("AGENT_RESULT_TOKEN", CALLBACK_TOKEN)
        .env("EXECUTION_ENDPOINT", EXECUTION_ENDPOINT)
        .env("INNGEST_EVENT_API_BASE_URL", broker_base)
        .env("INNGEST_EVENT_KEY", "e2e-event-key")
        .env("INNGEST_APP_ID", "agent_relay_e2e")
        .env("INNGEST_TIMEOUT_SECS", "3")
        .env("RUST_LOG", "info");
    Ok(cmd)
}

pub fn run_check(data_dir: &Path, broker_base: &str, extra_env: &[(&str, &str)]) -> TestResult<Output> {
    let mut cmd = service_command(data_dir, broker_base)?;
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    Ok(cmd.arg("check").output()?)
}

#[derive(Clone, Default)]
struct MockBrokerState {
    events: Arc<Mutex<Vec<(String, Value)>>>,
    failing: Arc<AtomicBool>,
}

async fn ingest_event(
    UrlPath(key): UrlPath<String>,
    State(state): State<MockBrokerState>,
    Json(event): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if state.failing.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "ingest paused" })),
        );
    }
    let id = event.get("id").cloned().unwrap_or(Value::Null);
    state
        .events
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push((key, event));
    (StatusCode::OK, Json(json!({ "ids": [id], "status": 200 })))
}

/// Stand-in for the event broker's ingest API.
pub struct MockBroker {
    pub port: u16,
    state: MockBrokerState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockBroker {
    pub async fn start() -> TestResult<Self> {
        let port = find_free_port()?;
        let state = MockBrokerState::default();
        let app = Router::new()
            .route("/e/{key}", post(ingest_event))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// `(event key, event body)` pairs in arrival order.
    pub fn events(&self) -> Vec<(String, Value)> {
        self.state
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

pub fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

pub fn is_bind_denied(err: &(dyn std::error::Error + Send + Sync)) -> bool {
    err.to_string().contains("Operation not permitted")
}

fn relay_binary_path() -> TestResult<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_agent-relay") {
        return Ok(PathBuf::from(path));
    }

    let candidate = PathBuf::from("target")
        .join("debug")
        .join(if cfg!(windows) {
            "agent-relay.exe"
        } else {
            "agent-relay"
        });
    if candidate.exists() {
        return Ok(candidate);
    }

    Err("Could not locate agent-relay test binary path".into())
}
