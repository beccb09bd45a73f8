use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use rondo_core::config::Config;
use rondo_core::tools::{self, ExecutionResult};
use rondo_core::{Agent, TaskContext};

/// Shared HTTP state. The agent instance is process-wide and reused
/// across requests; the mutex serializes them.
#[derive(Clone)]
pub struct AppState {
    agent: Arc<Mutex<Agent>>,
    config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let agent = Agent::new(&config);
        Self {
            agent: Arc::new(Mutex::new(agent)),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/run", post(run_handler))
        .route("/api/execute_code", post(execute_code_handler))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("rondo server listening on http://{addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    #[serde(default)]
    task: String,
    context: Option<TaskContext>,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    success: bool,
    result: TaskContext,
}

#[derive(Debug, Serialize)]
struct ApiError {
    success: bool,
    error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            success: false,
            error: message.into(),
        }),
    )
}

async fn run_handler(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, Json<ApiError>)> {
    if request.task.trim().is_empty() {
        return Err(bad_request("No task provided"));
    }

    let mut agent = state.agent.lock().await;

    // A request-supplied key rebuilds the shared agent; later requests
    // keep using the rebuilt instance.
    if let Some(api_key) = request.api_key.filter(|key| !key.is_empty()) {
        let mut config = state.config.clone();
        config.llm.api_key = api_key;
        *agent = Agent::new(&config);
    }

    let result = agent.run(&request.task, request.context).await;

    Ok(Json(RunResponse {
        success: true,
        result,
    }))
}

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Deserialize)]
struct ExecuteCodeRequest {
    #[serde(default)]
    code: String,
    #[serde(default = "default_language")]
    language: String,
}

#[derive(Debug, Serialize)]
struct ExecuteCodeResponse {
    success: bool,
    result: ExecutionResult,
}

async fn execute_code_handler(
    Json(request): Json<ExecuteCodeRequest>,
) -> Result<Json<ExecuteCodeResponse>, (StatusCode, Json<ApiError>)> {
    if request.code.trim().is_empty() {
        return Err(bad_request("No code provided"));
    }

    let result = tools::execute_code(&request.code, &request.language).await;

    Ok(Json(ExecuteCodeResponse {
        success: true,
        result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        build_router(AppState::new(Config::default()))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_responds_ok() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn run_without_task_is_rejected() {
        let response = test_router()
            .oneshot(json_post("/api/run", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn execute_code_without_code_is_rejected() {
        let response = test_router()
            .oneshot(json_post("/api/execute_code", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn execute_code_rejects_unsupported_language() {
        let response = test_router()
            .oneshot(json_post(
                "/api/execute_code",
                r#"{"code": "puts 1", "language": "ruby"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["success"], false);
        assert_eq!(body["result"]["error"], "Unsupported language: ruby");
    }
}
