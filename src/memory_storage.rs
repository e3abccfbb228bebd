use crate::errors::AppError;
use crate::models::{QuotationRequest, QuotationUpdate, Role, RouteStage, UserProfile};
use crate::storage::QuotationStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    quotations: Vec<QuotationRequest>,
    roles: HashSet<(Uuid, &'static str)>,
    profiles: Vec<UserProfile>,
    stages: Vec<RouteStage>,
}

/// Process-local `QuotationStore`.
///
/// Holds the same four tables as the managed backend behind one lock, so every
/// call is atomic. Used by the test suites and for running the service without
/// a database. `set_unavailable(true)` makes every call fail with a storage
/// error.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn grant_role(&self, user_id: Uuid, role: Role) {
        self.tables.write().await.roles.insert((user_id, role.as_str()));
    }

    pub async fn put_profile(&self, profile: UserProfile) {
        let mut tables = self.tables.write().await;
        tables.profiles.retain(|p| p.user_id != profile.user_id);
        tables.profiles.push(profile);
    }

    pub async fn put_stage(&self, stage: RouteStage) {
        self.tables.write().await.stages.push(stage);
    }

    /// Number of stored quotations, all owners included.
    pub async fn quotation_count(&self) -> usize {
        self.tables.read().await.quotations.len()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Storage("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

/// Newest first; among equal timestamps the later insert wins.
fn newest_first<'a>(rows: impl DoubleEndedIterator<Item = &'a QuotationRequest>) -> Vec<QuotationRequest> {
    let mut out: Vec<QuotationRequest> = rows.rev().cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

#[async_trait]
impl QuotationStore for InMemoryStore {
    async fn insert_quotation(&self, record: QuotationRequest) -> Result<QuotationRequest, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.quotations.iter().any(|q| q.id == record.id) {
            return Err(AppError::Storage(format!(
                "duplicate quotation id {}",
                record.id
            )));
        }
        tables.quotations.push(record.clone());
        Ok(record)
    }

    async fn find_quotation(&self, id: Uuid) -> Result<Option<QuotationRequest>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.quotations.iter().find(|q| q.id == id).cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<QuotationRequest>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.quotations.iter().filter(|q| q.user_id == user_id),
        ))
    }

    async fn list_all(&self) -> Result<Vec<QuotationRequest>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(newest_first(tables.quotations.iter()))
    }

    async fn apply_update(
        &self,
        id: Uuid,
        update: QuotationUpdate,
    ) -> Result<Option<QuotationRequest>, AppError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(record) = tables.quotations.iter_mut().find(|q| q.id == id) else {
            return Ok(None);
        };

        record.status = update.status;
        record.quote_details = update.quote_details;
        record.admin_notes = update.admin_notes;
        record.total_price = update.total_price;
        record.quoted_at = record.quoted_at.or(update.quoted_at);
        record.updated_at = update.updated_at;
        Ok(Some(record.clone()))
    }

    async fn has_role(&self, user_id: Uuid, role: Role) -> Result<bool, AppError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .roles
            .contains(&(user_id, role.as_str())))
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn list_route_stages(&self, route_id: &str) -> Result<Vec<RouteStage>, AppError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut stages: Vec<RouteStage> = tables
            .stages
            .iter()
            .filter(|s| s.route_id == route_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.stage_number);
        Ok(stages)
    }
}
