use crate::errors::AppError;
use crate::models::{Role, UserProfile};
use crate::storage::QuotationStore;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use moka::future::Cache;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Who is making a request, as established server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// No (valid) identity presented. May browse the catalog only.
    Anonymous,
    /// Authenticated without the admin role.
    User { user_id: Uuid },
    /// Authenticated with an `admin` row in `user_roles`.
    Admin { user_id: Uuid },
}

impl Caller {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::Anonymous => None,
            Caller::User { user_id } | Caller::Admin { user_id } => Some(*user_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin { .. })
    }

    /// The caller's identity, or `Unauthenticated` pointing at `redirect`.
    pub fn require_identity(&self, redirect: &str) -> Result<Uuid, AppError> {
        self.user_id().ok_or_else(|| AppError::Unauthenticated {
            redirect: redirect.to_string(),
        })
    }

    /// The caller's identity if they are an admin.
    pub fn require_admin(&self, redirect: &str) -> Result<Uuid, AppError> {
        match self {
            Caller::Admin { user_id } => Ok(*user_id),
            Caller::User { user_id } => Err(AppError::Forbidden(format!(
                "user {} lacks the admin role",
                user_id
            ))),
            Caller::Anonymous => Err(AppError::Unauthenticated {
                redirect: redirect.to_string(),
            }),
        }
    }
}

/// An identity vouched for by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    #[serde(rename = "id")]
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolves access tokens to identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the token is not (or no longer) valid.
    async fn identify(&self, access_token: &str) -> Result<Option<Identity>, AppError>;
}

/// Asks the managed backend's auth service who a token belongs to.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    client: reqwest::Client,
    user_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(base_url: &str, anon_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create auth client: {}", e)))?;

        Ok(Self {
            client,
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            anon_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn identify(&self, access_token: &str) -> Result<Option<Identity>, AppError> {
        let response = self
            .client
            .get(&self.user_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Auth request failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!("Access token rejected by auth provider");
                Ok(None)
            }
            status if status.is_success() => {
                let identity = response.json::<Identity>().await.map_err(|e| {
                    AppError::ExternalApiError(format!("Failed to parse auth response: {}", e))
                })?;
                Ok(Some(identity))
            }
            status => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(AppError::ExternalApiError(format!(
                    "Auth provider returned {}: {}",
                    status, error_text
                )))
            }
        }
    }
}

/// Extracts the bearer token from an `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn identity_cache(ttl: Duration) -> Cache<String, Uuid> {
    Cache::builder().time_to_live(ttl).max_capacity(10_000).build()
}

fn token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Default lifetime of a cached token -> identity answer.
pub const IDENTITY_CACHE_TTL: Duration = Duration::from_secs(30);

/// Turns request headers into a `Caller`.
///
/// Token -> identity answers are cached (keyed by token hash) for
/// `IDENTITY_CACHE_TTL` unless overridden, so a token revoked at the provider
/// keeps resolving until its entry expires. The admin role is looked up in the
/// store on every request and never taken from the client, so revoking a role
/// takes effect immediately.
#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn QuotationStore>,
    identity_cache: Cache<String, Uuid>,
}

impl AuthService {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn QuotationStore>) -> Self {
        Self {
            identity,
            store,
            identity_cache: identity_cache(IDENTITY_CACHE_TTL),
        }
    }

    /// Replaces the identity cache with one whose entries live for `ttl`.
    pub fn with_identity_ttl(mut self, ttl: Duration) -> Self {
        self.identity_cache = identity_cache(ttl);
        self
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Caller, AppError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(Caller::Anonymous);
        };

        let fingerprint = token_fingerprint(token);
        let user_id = match self.identity_cache.get(&fingerprint).await {
            Some(user_id) => user_id,
            None => match self.identity.identify(token).await? {
                Some(identity) => {
                    self.identity_cache
                        .insert(fingerprint, identity.user_id)
                        .await;
                    identity.user_id
                }
                None => return Ok(Caller::Anonymous),
            },
        };

        self.caller_for(user_id).await
    }

    /// Classifies an already-authenticated identity by its stored roles.
    pub async fn caller_for(&self, user_id: Uuid) -> Result<Caller, AppError> {
        if self.store.has_role(user_id, Role::Admin).await? {
            Ok(Caller::Admin { user_id })
        } else {
            Ok(Caller::User { user_id })
        }
    }

    /// The caller's profile row, if they have one.
    pub async fn current_profile(
        &self,
        caller: &Caller,
        redirect: &str,
    ) -> Result<Option<UserProfile>, AppError> {
        let user_id = caller.require_identity(redirect)?;
        self.store.find_profile(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_storage::InMemoryStore;
    use axum::http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedIdentity {
        token: &'static str,
        user_id: Uuid,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn identify(&self, access_token: &str) -> Result<Option<Identity>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((access_token == self.token).then(|| Identity {
                user_id: self.user_id,
                email: None,
            }))
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn admin_requirement() {
        let uid = Uuid::new_v4();
        assert!(Caller::Admin { user_id: uid }.require_admin("/auth").is_ok());
        assert!(matches!(
            Caller::User { user_id: uid }.require_admin("/auth"),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            Caller::Anonymous.require_admin("/auth"),
            Err(AppError::Unauthenticated { .. })
        ));
    }

    #[tokio::test]
    async fn resolves_roles_from_store_and_caches_identity() {
        let store = Arc::new(InMemoryStore::new());
        let uid = Uuid::new_v4();
        let provider = Arc::new(FixedIdentity {
            token: "good",
            user_id: uid,
            calls: AtomicUsize::new(0),
        });
        let auth = AuthService::new(provider.clone(), store.clone());

        assert_eq!(
            auth.resolve(&headers("Bearer good")).await.unwrap(),
            Caller::User { user_id: uid }
        );

        store.grant_role(uid, Role::Admin).await;
        assert_eq!(
            auth.resolve(&headers("Bearer good")).await.unwrap(),
            Caller::Admin { user_id: uid }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        assert_eq!(
            auth.resolve(&headers("Bearer forged")).await.unwrap(),
            Caller::Anonymous
        );
        assert_eq!(auth.resolve(&HeaderMap::new()).await.unwrap(), Caller::Anonymous);
    }

    #[tokio::test]
    async fn expired_identity_is_checked_again() {
        let provider = Arc::new(FixedIdentity {
            token: "good",
            user_id: Uuid::new_v4(),
            calls: AtomicUsize::new(0),
        });
        let auth = AuthService::new(provider.clone(), Arc::new(InMemoryStore::new()))
            .with_identity_ttl(Duration::from_millis(50));

        auth.resolve(&headers("Bearer good")).await.unwrap();
        auth.resolve(&headers("Bearer good")).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        auth.resolve(&headers("Bearer good")).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
