use crate::auth::{AuthClient, AuthUser};
use crate::board::LeadBoard;
use crate::config::Config;
use crate::errors::AppError;
use crate::lead_store::LeadStore;
use crate::models::*;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Where leads live.
    pub store: Arc<dyn LeadStore>,
    /// Application configuration.
    pub config: Config,
    /// Client for the hosted auth provider.
    pub auth: AuthClient,
    /// Fingerprints of recently accepted submissions, for the duplicate guard.
    /// `None` when the guard is disabled.
    pub recent_submissions: Option<Cache<String, ()>>,
    /// Validated sessions keyed by token hash, to spare the auth provider a
    /// round trip on every request.
    pub sessions: Cache<String, AuthUser>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn LeadStore>, auth: AuthClient) -> Self {
        // Duplicate guard: short TTL, only needs to span double clicks and retries
        let recent_submissions = (config.duplicate_window_secs > 0).then(|| {
            Cache::builder()
                .time_to_live(Duration::from_secs(config.duplicate_window_secs))
                .max_capacity(10_000)
                .build()
        });

        let sessions = Cache::builder()
            .time_to_live(Duration::from_secs(config.session_cache_secs))
            .max_capacity(1_000)
            .build();

        Self {
            store,
            config,
            auth,
            recent_submissions,
            sessions,
        }
    }
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "stride-leads",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/internal/session
///
/// The operator the request's session belongs to.
pub async fn session_user(Extension(user): Extension<AuthUser>) -> Json<AuthUser> {
    Json(user)
}

/// GET /api/internal/leads?status=
///
/// All leads, newest first, optionally restricted to one status.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    params: Result<Query<LeadListParams>, QueryRejection>,
) -> Result<Json<Vec<Lead>>, AppError> {
    let Query(params) = params?;
    let filter = params
        .filter()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut board = LeadBoard::load(state.store.as_ref()).await?;
    board.set_filter(filter);

    let leads: Vec<Lead> = board.filtered().cloned().collect();
    tracing::debug!("GET /leads - filter={} -> {} leads", filter.as_str(), leads.len());

    Ok(Json(leads))
}

/// GET /api/internal/leads/stats
pub async fn lead_stats(State(state): State<Arc<AppState>>) -> Result<Json<LeadStats>, AppError> {
    let board = LeadBoard::load(state.store.as_ref()).await?;
    Ok(Json(board.stats(Utc::now())))
}

/// PATCH /api/internal/leads/:id
///
/// Overwrites the lead's status. Last write wins.
pub async fn update_lead_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Lead>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let status: LeadStatus = payload
        .status
        .parse()
        .map_err(|e: ParseStatusError| AppError::BadRequest(e.to_string()))?;

    let lead = state
        .store
        .update_status(id, status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

    tracing::info!("Lead {} set to '{}' by {}", id, status, user.id);
    Ok(Json(lead))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

/// DELETE /api/internal/leads/:id?confirm=true
///
/// Permanently removes the lead. Without `confirm=true` nothing is deleted.
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    let Query(params) = params?;
    if !params.confirm {
        return Err(AppError::BadRequest(
            "Deleting a lead requires confirm=true".to_string(),
        ));
    }

    if !state.store.delete(id).await? {
        return Err(AppError::NotFound(format!("Lead {} not found", id)));
    }

    tracing::info!("Lead {} deleted by {}", id, user.id);
    Ok(StatusCode::NO_CONTENT)
}
