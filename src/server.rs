// src/server.rs
// =============================================================================
// HTTP transport: lets browsers start crawls and watch them live.
//
// Routes:
//   GET  /events       server-push stream of crawl records
//   POST /start-crawl  {"url": "..."} starts a crawl in the background
//   POST /snapshot     {"url": "..."} captures a single page and returns it
//   GET  /health       liveness probe
//
// All crawls share one Broadcaster, so every connected stream sees every run.
// A stream whose client disconnected is dropped on the next broadcast.
// =============================================================================

use crate::capture::snapshot;
use crate::config::CrawlConfig;
use crate::crawl::Crawler;
use crate::engine::EngineLauncher;
use crate::error::CrawlError;
use crate::events::{Broadcaster, CrawlEvent};
use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

/// Records buffered per SSE client before it is considered stalled
const SUBSCRIBER_BUFFER: usize = 32;

#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Broadcaster,
    pub config: Arc<CrawlConfig>,
    pub launcher: Arc<dyn EngineLauncher>,
}

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(events))
        .route("/start-crawl", post(start_crawl))
        .route("/snapshot", post(take_snapshot))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;
    tracing::info!("Screenshot service started on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("server error")
}

async fn events(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<String>(SUBSCRIBER_BUFFER);

    // greeting goes to this subscriber only
    if let Ok(record) = CrawlEvent::info("Connected to SSE").to_record() {
        let _ = tx.try_send(record);
    }
    state.broadcaster.subscribe(tx);

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

fn requested_url(request: &CrawlRequest) -> Option<String> {
    request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

async fn start_crawl(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> impl IntoResponse {
    let Some(url) = requested_url(&request) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "URL is required" })),
        );
    };

    tracing::info!("Starting crawl for URL: {}", url);
    let crawler = Crawler::new(
        (*state.config).clone(),
        Arc::clone(&state.launcher),
        state.broadcaster.clone(),
    );
    tokio::spawn(async move {
        let report = crawler.start_crawling(&url).await;
        tracing::info!(
            state = ?report.state,
            visited = report.visited,
            captured = report.captured,
            failed = report.failed,
            "Crawl of {} finished",
            report.seed
        );
    });

    (StatusCode::OK, Json(json!({ "message": "Crawling started" })))
}

async fn take_snapshot(
    State(state): State<AppState>,
    Json(request): Json<CrawlRequest>,
) -> impl IntoResponse {
    let Some(url) = requested_url(&request) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "URL is required" })),
        );
    };

    match snapshot(state.launcher.as_ref(), &url, &state.config.capture).await {
        Ok(artifact) => (
            StatusCode::OK,
            Json(json!({
                "message": "Screenshot captured",
                "url": artifact.url,
                "screenshot": artifact.data_uri(),
            })),
        ),
        Err(e) => {
            tracing::error!("Error in snapshot for {}: {}", url, e);
            let status = match e {
                CrawlError::InvalidSeedUrl(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "error": e.to_string() })))
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": {
            "version": env!("CARGO_PKG_VERSION"),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    }))
}
