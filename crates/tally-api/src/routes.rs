use std::hash::{Hash, Hasher};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tally_core::ledger::SupplierBalance;
use tally_core::services::LedgerService;
use tally_core::sync::ChangeSet;
use tally_core::{RecordId, SyncRequest, SyncResponse};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    jwt_verifier: Arc<JwtVerifier>,
    ledger: LedgerService,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, ledger: LedgerService) -> Self {
        Self {
            jwt_verifier: Arc::new(JwtVerifier::new(&config)),
            ledger,
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync", post(push_batch))
        .route("/sync/changes", get(pull_changes))
        .route("/suppliers/{id}/balance", get(supplier_balance))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

async fn push_batch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let user_hash = user_fingerprint(&user.user_id);
    let operations = request.operations.len();
    let response = state.ledger.sync(user.user_id, request).await?;
    tracing::info!(
        endpoint = "sync_push",
        user = user_hash,
        session = user.session_id.as_deref().unwrap_or("none"),
        operations,
        "Applied sync batch"
    );
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ChangesQuery {
    #[serde(default)]
    since: i64,
    limit: Option<usize>,
}

async fn pull_changes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<ChangeSet>, AppError> {
    let user_hash = user_fingerprint(&user.user_id);
    let changes = state.ledger.changes(query.since, query.limit).await?;
    tracing::info!(
        endpoint = "sync_pull",
        user = user_hash,
        since = query.since,
        count = changes.changes.len(),
        has_more = changes.has_more,
        "Served change set"
    );
    Ok(Json(changes))
}

async fn supplier_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<SupplierBalance>, AppError> {
    let supplier_id = id
        .parse::<RecordId>()
        .map_err(|_| AppError::bad_request(format!("Invalid supplier id: {id}")))?;

    let balance = state.ledger.supplier_balance(supplier_id).await?;
    tracing::info!(
        endpoint = "supplier_balance",
        user = user_fingerprint(&user.user_id),
        "Served supplier balance"
    );
    Ok(Json(balance))
}

fn user_fingerprint(user_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_id.hash(&mut hasher);
    hasher.finish()
}
