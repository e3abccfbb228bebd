use camino_api::app::{build_router, RouterOptions};
use camino_api::auth::{AuthService, SupabaseAuthClient};
use camino_api::catalog::RouteCatalog;
use camino_api::config::{Config, NotificationMode};
use camino_api::db::Database;
use camino_api::db_storage::PgStore;
use camino_api::handlers::AppState;
use camino_api::lifecycle::QuotationLifecycle;
use camino_api::notifications::{
    EdgeFunctionNotifier, LogOnlyNotifier, QueuedNotifier, QuotationNotifier,
};
use camino_api::site_gate::SiteGate;
use camino_api::stages::StageService;
use camino_api::storage::QuotationStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pending notifications held by the outbox before new ones are dropped.
const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, the auth client and
/// the notification outbox, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camino_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    let store: Arc<dyn QuotationStore> = Arc::new(PgStore::new(db.pool.clone()));

    let catalog = Arc::new(RouteCatalog::embedded()?);
    tracing::info!("Route catalog loaded: {} routes", catalog.routes().len());

    // Notification channel, always behind the outbox
    let channel: Arc<dyn QuotationNotifier> = match config.notification_mode {
        NotificationMode::Log => Arc::new(LogOnlyNotifier),
        NotificationMode::EdgeFunction => {
            let service_key = config.supabase_service_role_key.clone().ok_or_else(|| {
                anyhow::anyhow!("SUPABASE_SERVICE_ROLE_KEY required for edge-function mode")
            })?;
            let notifier = EdgeFunctionNotifier::new(&config.supabase_url, service_key)?;
            tracing::info!("✓ Edge function notifier: {}", notifier.endpoint());
            Arc::new(notifier)
        }
    };
    let (outbox, _outbox_worker) = QueuedNotifier::spawn(channel, NOTIFICATION_QUEUE_CAPACITY);
    tracing::info!("Notification outbox started ({:?})", config.notification_mode);

    let identity = Arc::new(SupabaseAuthClient::new(
        &config.supabase_url,
        config.supabase_anon_key.clone(),
    )?);

    let lifecycle = QuotationLifecycle::new(store.clone(), Arc::new(outbox), catalog.clone())
        .with_policy(config.transition_policy)
        .with_auth_redirect(config.auth_redirect_url.clone());

    // Build application state
    let app_state = Arc::new(AppState {
        lifecycle,
        auth: AuthService::new(identity, store.clone())
            .with_identity_ttl(Duration::from_secs(config.identity_cache_ttl_secs)),
        stages: StageService::new(store, Duration::from_secs(config.stage_cache_ttl_secs)),
        catalog,
        site_gate: Arc::new(SiteGate::new(config.site_access_password.as_deref())),
        auth_redirect: config.auth_redirect_url.clone(),
        notification_service_key: config.supabase_service_role_key.clone(),
    });

    let app = build_router(app_state, RouterOptions::default())?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
