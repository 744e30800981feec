pub mod jobs;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::{Result, ScrapeError};
use crate::parser::ArticleRecord;
use crate::service::NewsScraper;
use jobs::{Job, JobId, JobRegistry};

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    scraper: Arc<NewsScraper>,
    jobs: JobRegistry,
}

impl AppState {
    pub fn new(scraper: Arc<NewsScraper>) -> Self {
        Self {
            scraper,
            jobs: JobRegistry::new(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape-news", get(scrape_news))
        .route("/jobs", post(create_job))
        .route("/jobs/:id", get(get_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_api_server(scraper: Arc<NewsScraper>, server: &ServerConfig) -> Result<()> {
    let app = create_router(AppState::new(scraper));

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ScrapeError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ScrapeError::Config(format!("API server failed: {}", e)))
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

/// Synchronous scrape; responds with the bare article array.
async fn scrape_news(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<ArticleRecord>>, (StatusCode, Json<ApiResponse<()>>)> {
    info!("Scrape requested over HTTP");
    state.scraper.scrape_all().await.map(Json).map_err(|e| {
        error!("Scrape request failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Scrape failed: {}", e))),
        )
    })
}

async fn create_job(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<Job>>) {
    let job = state.jobs.create().await;
    let id = job.id;
    info!("Queued scrape job {}", id);

    let jobs = state.jobs.clone();
    let scraper = state.scraper.clone();
    tokio::spawn(async move {
        jobs.mark_running(id).await;
        match scraper.scrape_all().await {
            Ok(articles) => {
                info!("Scrape job {} completed with {} articles", id, articles.len());
                jobs.complete(id, articles).await;
            }
            Err(e) => {
                error!("Scrape job {} failed: {}", id, e);
                jobs.fail(id, e.to_string()).await;
            }
        }
    });

    (StatusCode::ACCEPTED, Json(ApiResponse::success(job)))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> (StatusCode, Json<ApiResponse<Job>>) {
    match state.jobs.get(id).await {
        Some(job) => (StatusCode::OK, Json(ApiResponse::success(job))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Job {} not found", id))),
        ),
    }
}
