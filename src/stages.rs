use crate::errors::AppError;
use crate::models::RouteStage;
use crate::storage::QuotationStore;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Reads `route_stages`, caching each route's stage list for a short TTL.
///
/// Stage content is edited rarely and read on every route page, so a stale
/// window of a few minutes is acceptable. Quotation data is never cached.
#[derive(Clone)]
pub struct StageService {
    store: Arc<dyn QuotationStore>,
    cache: Cache<String, Arc<Vec<RouteStage>>>,
}

impl StageService {
    pub fn new(store: Arc<dyn QuotationStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(256)
            .build();
        Self { store, cache }
    }

    /// Stages of `route_id` ordered by stage number. Unknown routes yield an empty list.
    pub async fn stages_for_route(&self, route_id: &str) -> Result<Arc<Vec<RouteStage>>, AppError> {
        if let Some(cached) = self.cache.get(route_id).await {
            tracing::debug!(route_id, "Route stages served from cache");
            return Ok(cached);
        }

        let stages = Arc::new(self.store.list_route_stages(route_id).await?);
        self.cache
            .insert(route_id.to_string(), stages.clone())
            .await;
        tracing::debug!(route_id, count = stages.len(), "Route stages loaded");
        Ok(stages)
    }
}
