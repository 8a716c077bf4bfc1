//! HTTP search API.
//!
//! `POST /search/rapper` runs a search and always answers with the response
//! envelope; only rejected requests get a non-200 status.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::GigscoutError;
use crate::models::SearchRequest;
use crate::orchestrator::PerformanceSearch;
use crate::service;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    search: Arc<dyn PerformanceSearch>,
    default_timeout_seconds: u64,
}

impl AppState {
    pub fn new(search: Arc<dyn PerformanceSearch>, default_timeout_seconds: u64) -> Self {
        Self {
            search,
            default_timeout_seconds,
        }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let search = service::build(&settings)?;
    let state = AppState::new(search, settings.search.default_timeout_seconds);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Gigscout API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Info", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Search", "POST /search/rapper");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/search/rapper", post(search))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchBody {
    #[serde(default, rename = "rapper_name", alias = "performer_name")]
    performer_name: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default)]
    bypass_cache: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    error_code: &'static str,
}

impl ErrorResponse {
    fn reply(status: StatusCode, error: String, error_code: &'static str) -> Response {
        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
                error_code,
            }),
        )
            .into_response()
    }
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "Gigscout performer search API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "search": "/search/rapper",
            "health": "/health",
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339(),
        "service": "rapper-search-api",
    }))
}

async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return ErrorResponse::reply(
                StatusCode::UNPROCESSABLE_ENTITY,
                rejection.body_text(),
                "VALIDATION_ERROR",
            )
        }
    };

    let request = SearchRequest {
        performer_name: body.performer_name,
        timeout_seconds: body.timeout_seconds.unwrap_or(state.default_timeout_seconds),
        bypass_cache: body.bypass_cache,
    };
    info!("Search request for {:?}", request.performer_name);

    match state.search.search(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(GigscoutError::Validation(message)) => {
            ErrorResponse::reply(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
        }
        Err(e) => {
            error!("Search for {:?} failed: {}", request.performer_name, e);
            ErrorResponse::reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                "INTERNAL_SERVER_ERROR",
            )
        }
    }
}
