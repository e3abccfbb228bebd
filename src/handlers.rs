use crate::auth::{AuthService, Caller};
use crate::catalog::{CatalogRoute, CatalogStage, RouteCatalog};
use crate::errors::AppError;
use crate::lifecycle::QuotationLifecycle;
use crate::models::{
    AdminPatch, QuotationRequest, QuotationStats, RouteStage, SubmitQuotationInput, UserProfile,
};
use crate::site_gate::SiteGate;
use crate::stages::StageService;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Quotation lifecycle operations.
    pub lifecycle: QuotationLifecycle,
    /// Resolves request headers into a `Caller`.
    pub auth: AuthService,
    /// Route stage reads (cached).
    pub stages: StageService,
    /// Static route catalog.
    pub catalog: Arc<RouteCatalog>,
    /// Shared-password perimeter; open when no password is configured.
    pub site_gate: Arc<SiteGate>,
    /// Where unauthenticated callers are sent to sign in.
    pub auth_redirect: String,
    /// Service-role key the notifier presents to the email endpoint.
    pub notification_service_key: Option<String>,
}

impl AppState {
    async fn caller(&self, headers: &HeaderMap) -> Result<Caller, AppError> {
        self.auth.resolve(headers).await
    }
}

/// Unwraps a JSON body, reporting malformed input as a validation error.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::validation("body", rejection.body_text()))
}

/// Health check endpoint.
///
/// Returns the service status and version.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "camino-api",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

// ============ Catalog ============

/// GET /api/v1/routes
///
/// Lists every catalog route without its stages.
pub async fn list_routes(State(state): State<Arc<AppState>>) -> Response {
    Json(state.catalog.summaries()).into_response()
}

/// GET /api/v1/routes/:route_id
pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
) -> Result<Response, AppError> {
    let route: &CatalogRoute = state
        .catalog
        .find_route_by_id(&route_id)
        .ok_or_else(|| AppError::NotFound(format!("Route {} not found", route_id)))?;
    Ok(Json(route).into_response())
}

/// GET /api/v1/routes/:route_id/stages
///
/// Detailed stages from `route_stages`, ordered by stage number. A route with
/// no stored stages yields an empty list.
pub async fn get_route_stages(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<String>,
) -> Result<Json<Vec<RouteStage>>, AppError> {
    tracing::debug!("GET /routes/{}/stages", route_id);
    let stages = state.stages.stages_for_route(&route_id).await?;
    Ok(Json(stages.as_ref().clone()))
}

#[derive(Serialize)]
struct StageWithRoute<'a> {
    route_id: &'a str,
    route_name: &'a str,
    #[serde(flatten)]
    stage: &'a CatalogStage,
}

/// GET /api/v1/stages/:stage_id
pub async fn get_stage(
    State(state): State<Arc<AppState>>,
    Path(stage_id): Path<String>,
) -> Result<Response, AppError> {
    let (route, stage) = state
        .catalog
        .find_stage_by_id(&stage_id)
        .ok_or_else(|| AppError::NotFound(format!("Stage {} not found", stage_id)))?;

    Ok(Json(StageWithRoute {
        route_id: &route.id,
        route_name: &route.name,
        stage,
    })
    .into_response())
}

// ============ Quotations ============

/// POST /api/v1/quotations
///
/// Submits a quotation request for the authenticated caller.
///
/// # Returns
///
/// * `201 Created` with the stored record, 400 on invalid input, 401 without identity.
pub async fn submit_quotation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<SubmitQuotationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<QuotationRequest>), AppError> {
    let caller = state.caller(&headers).await?;
    let input = json_body(body)?;
    let created = state.lifecycle.submit_quotation(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/quotations
///
/// The caller's own quotations, newest first.
pub async fn list_own_quotations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<QuotationRequest>>, AppError> {
    let caller = state.caller(&headers).await?;
    Ok(Json(state.lifecycle.list_own_quotations(&caller).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub profile: Option<UserProfile>,
}

/// GET /api/v1/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AppError> {
    let caller = state.caller(&headers).await?;
    let user_id = caller.require_identity(&state.auth_redirect)?;
    let profile = state
        .auth
        .current_profile(&caller, &state.auth_redirect)
        .await?;

    Ok(Json(MeResponse {
        user_id,
        is_admin: caller.is_admin(),
        profile,
    }))
}

// ============ Admin ============

/// GET /api/v1/admin/quotations
pub async fn admin_list_quotations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<QuotationRequest>>, AppError> {
    let caller = state.caller(&headers).await?;
    Ok(Json(state.lifecycle.list_all_quotations(&caller).await?))
}

/// GET /api/v1/admin/quotations/stats
pub async fn admin_quotation_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<QuotationStats>, AppError> {
    let caller = state.caller(&headers).await?;
    Ok(Json(state.lifecycle.quotation_stats(&caller).await?))
}

/// PATCH /api/v1/admin/quotations/:id
///
/// Applies an admin patch. Setting status to QUOTED also triggers the
/// customer notification; a failed notification does not fail the request.
pub async fn admin_update_quotation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Result<Json<AdminPatch>, JsonRejection>,
) -> Result<Json<QuotationRequest>, AppError> {
    let caller = state.caller(&headers).await?;
    let patch = json_body(body)?;
    tracing::info!("PATCH /admin/quotations/{}", id);
    Ok(Json(
        state.lifecycle.update_quotation(&caller, id, patch).await?,
    ))
}

// ============ Site access ============

#[derive(Debug, Deserialize)]
pub struct SiteAccessRequest {
    pub password: String,
}

/// POST /api/v1/site-access
///
/// Exchanges the shared site password for the `X-Site-Access` token.
pub async fn site_access(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SiteAccessRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(body)?;

    if !state.site_gate.is_enabled() {
        return Ok(Json(json!({ "granted": true })).into_response());
    }

    match state.site_gate.unlock(&request.password) {
        Some(token) => {
            tracing::info!("Site access granted");
            Ok(Json(json!({ "granted": true, "token": token })).into_response())
        }
        None => {
            tracing::warn!("Site access denied: wrong password");
            Ok((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "granted": false, "error": "Incorrect password" })),
            )
                .into_response())
        }
    }
}
