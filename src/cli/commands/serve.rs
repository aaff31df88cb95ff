//! HTTP API server for the course assistant.
//!
//! Provides REST endpoints for queries, catalog statistics and sessions.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SyllabusError;
use crate::tools::Source;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    assistant: CourseAssistant,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: &str,
    port: u16,
    docs: Option<&str>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'syllabus doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = CourseAssistant::new(settings)?;

    if let Some(docs) = docs {
        let folder = Settings::expand_path(docs);
        let (courses, chunks) = assistant.add_course_folder(&folder, false).await?;
        info!("Loaded {} courses with {} chunks from {}", courses, chunks, folder.display());
    }

    let app = router(Arc::new(AppState { assistant }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Syllabus API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /api/query");
    Output::kv("Courses", "GET  /api/courses");
    Output::kv("New session", "POST /api/new-session");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .route("/api/new-session", post(new_session))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<Source>,
    session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CourseStats {
    total_courses: usize,
    course_titles: Vec<String>,
}

#[derive(Default, Deserialize)]
struct NewSessionRequest {
    #[serde(default)]
    old_session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NewSessionResponse {
    session_id: String,
    message: String,
}

/// Any failure becomes a 500 with a `detail` message.
#[derive(Debug)]
struct ApiError(String);

impl From<SyllabusError> for ApiError {
    fn from(e: SyllabusError) -> Self {
        Self(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": self.0 })),
        )
            .into_response()
    }
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Syllabus Course Materials API" }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session_id = match req.session_id {
        Some(id) => id,
        None => state.assistant.sessions().create_session()?,
    };

    let response = state.assistant.query(&req.query, Some(&session_id)).await?;

    Ok(Json(QueryResponse {
        answer: response.answer,
        sources: response.sources,
        session_id,
    }))
}

async fn courses(State(state): State<Arc<AppState>>) -> Result<Json<CourseStats>, ApiError> {
    let analytics = state.assistant.course_analytics().await?;
    Ok(Json(CourseStats {
        total_courses: analytics.total_courses,
        course_titles: analytics.course_titles,
    }))
}

async fn new_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, ApiError> {
    let sessions = state.assistant.sessions();
    if let Some(old) = &req.old_session_id {
        sessions.clear_session(old)?;
    }

    Ok(Json(NewSessionResponse {
        session_id: sessions.create_session()?,
        message: "New chat session started successfully".to_string(),
    }))
}
