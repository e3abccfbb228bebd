use crate::auth::IDENTITY_CACHE_TTL;
use crate::lifecycle::TransitionPolicy;

/// How quotation notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMode {
    /// Render and log the email only.
    Log,
    /// Call the backend's `send-quotation-email` function.
    EdgeFunction,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: Option<String>,
    pub notification_mode: NotificationMode,
    pub auth_redirect_url: String,
    pub site_access_password: Option<String>,
    pub transition_policy: TransitionPolicy,
    pub stage_cache_ttl_secs: u64,
    pub identity_cache_ttl_secs: u64,
}

fn non_empty(name: &str, value: Option<String>) -> anyhow::Result<String> {
    let value = value.ok_or_else(|| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            config.database_url.chars().take(20).collect::<String>()
        );
        tracing::debug!("Supabase URL: {}", config.supabase_url);
        tracing::debug!("Notification mode: {:?}", config.notification_mode);
        tracing::debug!("Transition policy: {:?}", config.transition_policy);
        if config.site_access_password.is_some() {
            tracing::info!("Site access perimeter enabled");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = non_empty(
            "DATABASE_URL",
            lookup("DATABASE_URL").or_else(|| lookup("DB_URL")),
        )?;
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
        }

        let supabase_url = non_empty("SUPABASE_URL", lookup("SUPABASE_URL"))?;
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            anyhow::bail!("SUPABASE_URL must start with http:// or https://");
        }
        url::Url::parse(&supabase_url)
            .map_err(|e| anyhow::anyhow!("SUPABASE_URL is not a valid URL: {}", e))?;

        let supabase_anon_key = non_empty("SUPABASE_ANON_KEY", lookup("SUPABASE_ANON_KEY"))?;
        let supabase_service_role_key = optional(lookup("SUPABASE_SERVICE_ROLE_KEY"));

        let notification_mode = match optional(lookup("NOTIFICATION_MODE")).as_deref() {
            None | Some("log") => NotificationMode::Log,
            Some("edge-function") => NotificationMode::EdgeFunction,
            Some(other) => anyhow::bail!(
                "NOTIFICATION_MODE must be 'log' or 'edge-function', got '{}'",
                other
            ),
        };
        if notification_mode == NotificationMode::EdgeFunction
            && supabase_service_role_key.is_none()
        {
            anyhow::bail!("NOTIFICATION_MODE=edge-function requires SUPABASE_SERVICE_ROLE_KEY");
        }

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?;

        let transition_policy = match optional(lookup("STRICT_TRANSITIONS"))
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("false") | Some("0") => TransitionPolicy::Lenient,
            Some("true") | Some("1") => TransitionPolicy::Strict,
            Some(other) => anyhow::bail!("STRICT_TRANSITIONS must be true or false, got '{}'", other),
        };

        let stage_cache_ttl_secs = match optional(lookup("STAGE_CACHE_TTL_SECS")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("STAGE_CACHE_TTL_SECS must be a whole number of seconds"))?,
            None => 300,
        };

        let identity_cache_ttl_secs = match optional(lookup("IDENTITY_CACHE_TTL_SECS")) {
            Some(raw) => raw.parse().map_err(|_| {
                anyhow::anyhow!("IDENTITY_CACHE_TTL_SECS must be a whole number of seconds")
            })?,
            None => IDENTITY_CACHE_TTL.as_secs(),
        };

        Ok(Self {
            database_url,
            port,
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            notification_mode,
            auth_redirect_url: optional(lookup("AUTH_REDIRECT_URL"))
                .unwrap_or_else(|| "/auth".to_string()),
            site_access_password: optional(lookup("SITE_ACCESS_PASSWORD")),
            transition_policy,
            stage_cache_ttl_secs,
            identity_cache_ttl_secs,
        })
    }
}
