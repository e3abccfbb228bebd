use crate::errors::AppError;
use crate::models::{QuotationRequest, QuotationUpdate, Role, RouteStage, UserProfile};
use async_trait::async_trait;
use uuid::Uuid;

/// Access to the managed backend's tables.
///
/// Implementations enforce row ownership in the query itself: `list_by_user`
/// must never return another identity's rows. Each method is a single atomic
/// statement against the store.
#[async_trait]
pub trait QuotationStore: Send + Sync {
    /// Inserts a fully built record and returns it as persisted.
    async fn insert_quotation(&self, record: QuotationRequest) -> Result<QuotationRequest, AppError>;

    async fn find_quotation(&self, id: Uuid) -> Result<Option<QuotationRequest>, AppError>;

    /// Rows owned by `user_id`, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<QuotationRequest>, AppError>;

    /// Every row, newest first.
    async fn list_all(&self) -> Result<Vec<QuotationRequest>, AppError>;

    /// Writes all columns of `update` in one statement.
    ///
    /// `quoted_at` is only written when the stored value is null. Returns
    /// `None` when no row has the id.
    async fn apply_update(
        &self,
        id: Uuid,
        update: QuotationUpdate,
    ) -> Result<Option<QuotationRequest>, AppError>;

    async fn has_role(&self, user_id: Uuid, role: Role) -> Result<bool, AppError>;

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;

    /// Stages of a route ordered by `stage_number`.
    async fn list_route_stages(&self, route_id: &str) -> Result<Vec<RouteStage>, AppError>;
}
