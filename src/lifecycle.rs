//! Quotation Lifecycle.
//!
//! ```text
//! OPEN_FOR_QUOTATION --> QUOTED --> ACCEPTED --> COMPLETED
//!                          |
//!                          +------> REJECTED
//! ```
//!
//! Customers create records (always OPEN_FOR_QUOTATION) and read their own;
//! admins read everything and are the only writers after creation. Entering
//! QUOTED stamps `quoted_at` once and fires the notification hook.

use crate::auth::Caller;
use crate::catalog::RouteCatalog;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    AdminPatch, QuotationRequest, QuotationStats, QuotationStatus, QuotationUpdate,
    SubmitQuotationInput,
};
use crate::notifications::{NotificationPayload, QuotationNotifier};
use crate::storage::QuotationStore;
use crate::validation::validate_submission;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

impl QuotationStatus {
    /// Whether the state machine has an edge from `self` to `next`.
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        self == next
            || matches!(
                (self, next),
                (OpenForQuotation, Quoted)
                    | (Quoted, Accepted)
                    | (Quoted, Rejected)
                    | (Accepted, Completed)
            )
    }
}

/// What to do with a status change that has no edge in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Persist it and log a warning.
    #[default]
    Lenient,
    /// Reject it as a validation error on `status`.
    Strict,
}

/// Computes the columns an admin patch writes.
///
/// `updated_at` is `now`, or one microsecond past the stored value when the
/// clock has not moved past it. `quoted_at` is stamped only if the resulting
/// status is QUOTED and the record was never quoted before. Prices are stored
/// with exactly two decimal places.
pub fn plan_update(
    current: &QuotationRequest,
    patch: &AdminPatch,
    now: DateTime<Utc>,
    policy: TransitionPolicy,
) -> Result<QuotationUpdate, AppError> {
    if patch.is_empty() {
        return Err(AppError::validation("body", "nothing to update"));
    }

    let next_status = match patch.status.as_deref() {
        Some(raw) => raw
            .parse::<QuotationStatus>()
            .map_err(|msg| AppError::validation("status", msg))?,
        None => current.status,
    };

    let total_price = match &patch.total_price {
        Some(price) if price < &BigDecimal::zero() => {
            return Err(AppError::validation("totalPrice", "must not be negative"));
        }
        Some(price) if price.with_scale(2) != *price => {
            return Err(AppError::validation(
                "totalPrice",
                "must have at most two decimal places",
            ));
        }
        Some(price) => Some(price.with_scale(2)),
        None => current.total_price.clone(),
    };

    if !current.status.can_transition_to(next_status) {
        match policy {
            TransitionPolicy::Strict => {
                return Err(AppError::validation(
                    "status",
                    format!("cannot move from {} to {}", current.status, next_status),
                ));
            }
            TransitionPolicy::Lenient => {
                tracing::warn!(
                    quotation_id = %current.id,
                    from = %current.status,
                    to = %next_status,
                    "Applying status change outside the quotation state machine"
                );
            }
        }
    }

    let updated_at = if now > current.updated_at {
        now
    } else {
        current.updated_at + Duration::microseconds(1)
    };

    let quoted_at = match current.quoted_at {
        Some(at) => Some(at),
        None if next_status == QuotationStatus::Quoted => Some(updated_at),
        None => None,
    };

    Ok(QuotationUpdate {
        status: next_status,
        quote_details: patch
            .quote_details
            .clone()
            .or_else(|| current.quote_details.clone()),
        admin_notes: patch
            .admin_notes
            .clone()
            .or_else(|| current.admin_notes.clone()),
        total_price,
        quoted_at,
        updated_at,
    })
}

/// The lifecycle's public operations, each gated on the caller.
#[derive(Clone)]
pub struct QuotationLifecycle {
    store: Arc<dyn QuotationStore>,
    notifier: Arc<dyn QuotationNotifier>,
    catalog: Arc<RouteCatalog>,
    policy: TransitionPolicy,
    auth_redirect: String,
}

impl QuotationLifecycle {
    pub fn new(
        store: Arc<dyn QuotationStore>,
        notifier: Arc<dyn QuotationNotifier>,
        catalog: Arc<RouteCatalog>,
    ) -> Self {
        Self {
            store,
            notifier,
            catalog,
            policy: TransitionPolicy::default(),
            auth_redirect: "/auth".to_string(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_auth_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.auth_redirect = redirect.into();
        self
    }

    /// Creates a new OPEN_FOR_QUOTATION record owned by the caller.
    pub async fn submit_quotation(
        &self,
        caller: &Caller,
        input: SubmitQuotationInput,
    ) -> Result<QuotationRequest, AppError> {
        let user_id = caller.require_identity(&self.auth_redirect)?;
        let submission = validate_submission(&input)?;

        let now = Utc::now();
        let record = QuotationRequest {
            id: Uuid::new_v4(),
            user_id,
            route_id: submission.route_id,
            full_name: submission.full_name,
            email: submission.email,
            phone: submission.phone,
            start_date: Some(submission.start_date),
            end_date: Some(submission.end_date),
            number_of_people: submission.number_of_people,
            accommodation_preference: submission.accommodation_preference,
            special_requirements: submission.special_requirements,
            status: QuotationStatus::OpenForQuotation,
            quote_details: None,
            admin_notes: None,
            total_price: None,
            quoted_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .store
            .insert_quotation(record)
            .await
            .context("Failed to submit quotation")?;

        tracing::info!(
            quotation_id = %created.id,
            user_id = %user_id,
            route_id = %created.route_id,
            "Quotation submitted"
        );
        Ok(created)
    }

    /// The caller's own records, newest first.
    pub async fn list_own_quotations(
        &self,
        caller: &Caller,
    ) -> Result<Vec<QuotationRequest>, AppError> {
        let user_id = caller.require_identity(&self.auth_redirect)?;
        let records = self.store.list_by_user(user_id).await?;

        if caller.is_admin() {
            return Ok(records);
        }
        Ok(records
            .into_iter()
            .map(QuotationRequest::customer_view)
            .collect())
    }

    /// Every record, newest first. Admin only.
    pub async fn list_all_quotations(
        &self,
        caller: &Caller,
    ) -> Result<Vec<QuotationRequest>, AppError> {
        caller.require_admin(&self.auth_redirect)?;
        self.store.list_all().await
    }

    /// Status counts over every record. Admin only.
    pub async fn quotation_stats(&self, caller: &Caller) -> Result<QuotationStats, AppError> {
        let records = self.list_all_quotations(caller).await?;
        Ok(QuotationStats::from_records(&records))
    }

    /// Applies an admin patch. Admin only.
    ///
    /// When the resulting status is QUOTED the notification hook is called
    /// after the write; its failure is logged and does not affect the result.
    pub async fn update_quotation(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: AdminPatch,
    ) -> Result<QuotationRequest, AppError> {
        let admin_id = caller.require_admin(&self.auth_redirect)?;

        let current = self
            .store
            .find_quotation(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quotation {} not found", id)))?;

        let update = plan_update(&current, &patch, Utc::now(), self.policy)?;

        let updated = self
            .store
            .apply_update(id, update)
            .await
            .with_context(|| format!("Failed to update quotation {}", id))?
            .ok_or_else(|| AppError::NotFound(format!("Quotation {} not found", id)))?;

        tracing::info!(
            quotation_id = %id,
            admin_id = %admin_id,
            from = %current.status,
            to = %updated.status,
            "Quotation updated"
        );

        if updated.status == QuotationStatus::Quoted {
            self.notify_quoted(&updated).await;
        }

        Ok(updated)
    }

    async fn notify_quoted(&self, record: &QuotationRequest) {
        let payload =
            NotificationPayload::for_quotation(record, self.catalog.route_name(&record.route_id));
        if let Err(e) = self.notifier.notify(&payload).await {
            tracing::error!(
                quotation_id = %record.id,
                "Quotation notification failed (update kept): {}",
                e
            );
        }
    }
}
