use crate::handlers::{self, AppState};
use crate::notification_handler;
use crate::site_gate::require_site_access;
use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request bodies larger than this are rejected before reaching a handler.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the working directory; a missing file is a 404.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page pointed at `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Camino API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Router options that differ between the server and in-process tests.
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Per-IP rate limiting on submission routes. Needs the client address,
    /// so the server must be started with `into_make_service_with_connect_info`.
    pub rate_limit: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self { rate_limit: true }
    }
}

/// Builds the full HTTP router.
///
/// Layout:
/// - `/health` and the docs bypass everything but tracing.
/// - `/api/v1/site-access` is reachable without the perimeter token.
/// - every other `/api/v1` route sits behind the site gate.
pub fn build_router(state: Arc<AppState>, options: RouterOptions) -> anyhow::Result<Router> {
    // Customer-controlled writes and password guesses are rate limited
    let mut submission_routes: Router<Arc<AppState>> = Router::new().route(
        "/api/v1/quotations",
        post(handlers::submit_quotation).get(handlers::list_own_quotations),
    );
    let mut access_routes: Router<Arc<AppState>> =
        Router::new().route("/api/v1/site-access", post(handlers::site_access));

    if options.rate_limit {
        // 5 requests/second per IP, burst of 10
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(5)
                .burst_size(10)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
        );
        submission_routes = submission_routes.layer(GovernorLayer {
            config: governor_conf.clone(),
        });
        access_routes = access_routes.layer(GovernorLayer {
            config: governor_conf,
        });
    }

    let api_routes = Router::new()
        .route("/api/v1/routes", get(handlers::list_routes))
        .route("/api/v1/routes/:route_id", get(handlers::get_route))
        .route(
            "/api/v1/routes/:route_id/stages",
            get(handlers::get_route_stages),
        )
        .route("/api/v1/stages/:stage_id", get(handlers::get_stage))
        .route("/api/v1/me", get(handlers::me))
        .route(
            "/api/v1/admin/quotations",
            get(handlers::admin_list_quotations),
        )
        .route(
            "/api/v1/admin/quotations/stats",
            get(handlers::admin_quotation_stats),
        )
        .route(
            "/api/v1/admin/quotations/:id",
            patch(handlers::admin_update_quotation),
        )
        .route(
            "/api/v1/notifications/quotation-email",
            post(notification_handler::quotation_email),
        )
        .merge(submission_routes)
        .route_layer(middleware::from_fn_with_state(
            state.site_gate.clone(),
            require_site_access,
        ))
        // Merged after the gate so it stays reachable without a token
        .merge(access_routes)
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}
