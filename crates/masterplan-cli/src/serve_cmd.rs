use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use masterplan_core::channels::validate_format;
use masterplan_core::creative::{DEFAULT_ASPECT_RATIOS, generate_creative_concepts};
use masterplan_core::generate::{FailureCategory, GenerationError};
use masterplan_core::keywords::{DEFAULT_KEYWORD_COUNT, suggest_keywords};
use masterplan_core::metrics::{CampaignMetrics, PurchaseUnit};
use masterplan_core::pipeline::PlanPipeline;
use masterplan_core::plan::{InMemoryPlanStore, PlanStore, StoreError, summarize_plan};
use masterplan_core::service::Language;

use crate::extract_cmd::extract_report;
use crate::reconcile_cmd::reconcile_with_objective;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
    category: Option<FailureCategory>,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
            category: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            category: None,
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        let category = err.category();
        let status = match category {
            FailureCategory::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            FailureCategory::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            FailureCategory::Generic => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
            category: Some(category),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::OwnerMismatch(_) => StatusCode::FORBIDDEN,
        };
        Self {
            status,
            message: err.to_string(),
            category: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = match self.category {
            Some(category) => serde_json::json!({ "error": self.message, "category": category }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State and request types
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pipeline: PlanPipeline,
    pub store: Arc<dyn PlanStore>,
}

impl AppState {
    pub fn new(pipeline: PlanPipeline) -> Self {
        Self {
            pipeline,
            store: Arc::new(InMemoryPlanStore::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub metrics: CampaignMetrics,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub unit: Option<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub prompt: String,
    /// Reference date for relative periods. Defaults to today.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct FormatCheckQuery {
    pub channel: String,
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct FormatCheckResponse {
    pub channel: String,
    pub requested: String,
    pub format: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub owner: String,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub prompt: String,
    /// When given, must match the stored plan's owner.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize)]
pub struct KeywordsRequest {
    pub prompt: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativesRequest {
    pub prompt: String,
    #[serde(default)]
    pub aspect_ratios: Option<Vec<String>>,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeResponse {
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concepts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/reconcile", post(reconcile_handler))
        .route("/api/extract", post(extract_handler))
        .route("/api/formats", get(list_formats))
        .route("/api/formats/check", get(check_format))
        .route("/api/creatives", post(creatives_handler))
        .route("/api/keywords", post(keywords_handler))
        .route("/api/plans", get(list_plans))
        .route("/api/plans/generate", post(generate_handler))
        .route("/api/plans/{id}", get(get_plan).delete(delete_plan))
        .route("/api/plans/{id}/summary", get(get_plan_summary))
        .route("/api/plans/{id}/regenerate", post(regenerate_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("masterplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("masterplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn reconcile_handler(Json(req): Json<ReconcileRequest>) -> Json<CampaignMetrics> {
    Json(reconcile_with_objective(
        &req.metrics,
        req.objective.as_deref(),
        req.unit,
    ))
}

async fn extract_handler(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> axum::response::Response {
    let today = req.today.unwrap_or_else(|| Utc::now().date_naive());
    Json(extract_report(&req.prompt, today, state.pipeline.extractor())).into_response()
}

async fn list_formats(State(state): State<AppState>) -> axum::response::Response {
    Json(state.pipeline.table().channels()).into_response()
}

async fn check_format(
    State(state): State<AppState>,
    Query(query): Query<FormatCheckQuery>,
) -> Json<FormatCheckResponse> {
    let table = state.pipeline.table();
    Json(FormatCheckResponse {
        format: validate_format(&query.channel, &query.format, table),
        allowed: table.is_allowed(&query.channel, &query.format),
        channel: query.channel,
        requested: query.format,
    })
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<axum::response::Response, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt must not be empty"));
    }
    if req.owner.trim().is_empty() {
        return Err(AppError::bad_request("owner must not be empty"));
    }

    let pipeline = match req.language {
        Some(language) => state.pipeline.clone().with_language(language),
        None => state.pipeline.clone(),
    };
    let plan = pipeline
        .run(&req.prompt, &req.owner, Utc::now(), &CancellationToken::new())
        .await?;
    let plan = state.store.upsert(plan).await?;

    Ok((StatusCode::CREATED, Json(plan)).into_response())
}

async fn regenerate_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RegenerateRequest>,
) -> Result<axum::response::Response, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt must not be empty"));
    }
    let existing = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    if req.owner.as_deref().is_some_and(|owner| owner != existing.owner_id) {
        return Err(StoreError::OwnerMismatch(id).into());
    }

    let pipeline = match req.language {
        Some(language) => state.pipeline.clone().with_language(language),
        None => state.pipeline.clone(),
    };
    let plan = pipeline
        .regenerate(&existing, &req.prompt, Utc::now(), &CancellationToken::new())
        .await?;
    let plan = state.store.upsert(plan).await?;

    Ok(Json(plan).into_response())
}

async fn keywords_handler(
    State(state): State<AppState>,
    Json(req): Json<KeywordsRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt must not be empty"));
    }
    let keywords = suggest_keywords(
        state.pipeline.service(),
        &req.prompt,
        req.count.unwrap_or(DEFAULT_KEYWORD_COUNT),
        req.language.unwrap_or(state.pipeline.language()),
        state.pipeline.policy(),
        &CancellationToken::new(),
    )
    .await?;
    Ok(Json(keywords))
}

async fn creatives_handler(
    State(state): State<AppState>,
    Json(req): Json<CreativesRequest>,
) -> Result<Json<Vec<CreativeResponse>>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt must not be empty"));
    }
    let ratios: Vec<&str> = match &req.aspect_ratios {
        Some(ratios) if !ratios.is_empty() => ratios.iter().map(String::as_str).collect(),
        _ => DEFAULT_ASPECT_RATIOS.to_vec(),
    };
    let language = req.language.unwrap_or(state.pipeline.language());

    let results = generate_creative_concepts(
        state.pipeline.service(),
        &req.prompt,
        &ratios,
        language,
        state.pipeline.policy(),
        &CancellationToken::new(),
    )
    .await;

    let body = results
        .into_iter()
        .map(|result| match result.concepts {
            Ok(concepts) => CreativeResponse {
                aspect_ratio: result.aspect_ratio,
                concepts: Some(concepts),
                error: None,
                category: None,
            },
            Err(err) => CreativeResponse {
                aspect_ratio: result.aspect_ratio,
                concepts: None,
                category: Some(err.category()),
                error: Some(err.to_string()),
            },
        })
        .collect();
    Ok(Json(body))
}

async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<axum::response::Response, AppError> {
    let plans = state.store.list_by_owner(&query.owner).await?;
    Ok(Json(plans).into_response())
}

async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    let plan = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    Ok(Json(plan).into_response())
}

async fn delete_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_plan_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    let plan = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    Ok(Json(summarize_plan(&plan)).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
