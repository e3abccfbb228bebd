/// Lifecycle scenarios run against the in-memory store
/// Covers submission, ownership, admin updates and the notification hook
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use camino_api::auth::Caller;
use camino_api::catalog::RouteCatalog;
use camino_api::errors::AppError;
use camino_api::lifecycle::{QuotationLifecycle, TransitionPolicy};
use camino_api::memory_storage::InMemoryStore;
use camino_api::models::{AdminPatch, QuotationStatus, SubmitQuotationInput};
use camino_api::notifications::{NotificationError, NotificationPayload, QuotationNotifier};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<NotificationPayload>>,
    fail: bool,
}

#[async_trait]
impl QuotationNotifier for RecordingNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        self.sent.lock().await.push(payload.clone());
        if self.fail {
            return Err(NotificationError::Transport("mail relay down".to_string()));
        }
        Ok(())
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    notifier: Arc<RecordingNotifier>,
    lifecycle: QuotationLifecycle,
    customer: Caller,
    admin: Caller,
}

fn harness_with(notifier: RecordingNotifier, policy: TransitionPolicy) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(notifier);
    let catalog = Arc::new(RouteCatalog::embedded().unwrap());
    let lifecycle = QuotationLifecycle::new(store.clone(), notifier.clone(), catalog)
        .with_policy(policy)
        .with_auth_redirect("/auth");
    Harness {
        store,
        notifier,
        lifecycle,
        customer: Caller::User {
            user_id: Uuid::new_v4(),
        },
        admin: Caller::Admin {
            user_id: Uuid::new_v4(),
        },
    }
}

fn harness() -> Harness {
    harness_with(RecordingNotifier::default(), TransitionPolicy::Lenient)
}

fn ana_submission() -> SubmitQuotationInput {
    SubmitQuotationInput {
        route_id: Some("camino-frances".to_string()),
        full_name: Some("Ana Ruiz".to_string()),
        email: Some("ana@example.com".to_string()),
        start_date: Some("2025-05-01".to_string()),
        end_date: Some("2025-05-10".to_string()),
        number_of_people: Some(2),
        ..Default::default()
    }
}

fn price(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

#[tokio::test]
async fn test_happy_path_submit_then_quote() {
    let h = harness();

    let created = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();
    assert_eq!(created.status, QuotationStatus::OpenForQuotation);
    assert!(created.quoted_at.is_none());
    assert_eq!(Some(created.user_id), h.customer.user_id());

    let patch = AdminPatch::default()
        .with_status(QuotationStatus::Quoted)
        .with_total_price(price("1200.00"))
        .with_quote_details("10-night package");
    let quoted = h
        .lifecycle
        .update_quotation(&h.admin, created.id, patch)
        .await
        .unwrap();

    assert_eq!(quoted.status, QuotationStatus::Quoted);
    assert!(quoted.quoted_at.is_some());
    assert_eq!(quoted.quote_details.as_deref(), Some("10-night package"));

    let sent = h.notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].quotation_id, created.id);
    assert_eq!(sent[0].total_price, Some(price("1200.00")));
    assert_eq!(sent[0].customer_email, "ana@example.com");
    assert_eq!(sent[0].route_name, "Camino Francés");
}

#[tokio::test]
async fn test_rejection_keeps_first_quoted_at() {
    let h = harness();
    let created = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();

    let quoted = h
        .lifecycle
        .update_quotation(
            &h.admin,
            created.id,
            AdminPatch::default().with_status(QuotationStatus::Quoted),
        )
        .await
        .unwrap();
    let rejected = h
        .lifecycle
        .update_quotation(
            &h.admin,
            created.id,
            AdminPatch::default().with_status(QuotationStatus::Rejected),
        )
        .await
        .unwrap();

    assert_eq!(rejected.status, QuotationStatus::Rejected);
    assert_eq!(rejected.quoted_at, quoted.quoted_at);

    let own = h.lifecycle.list_own_quotations(&h.customer).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].status, QuotationStatus::Rejected);

    // Only the QUOTED transition notifies
    assert_eq!(h.notifier.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn test_non_admin_update_is_forbidden_and_changes_nothing() {
    let h = harness();
    let created = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();

    let result = h
        .lifecycle
        .update_quotation(
            &h.customer,
            created.id,
            AdminPatch::default()
                .with_status(QuotationStatus::Completed)
                .with_quote_details("free trip"),
        )
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let own = h.lifecycle.list_own_quotations(&h.customer).await.unwrap();
    assert_eq!(own[0], created);
    assert!(h.notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_missing_email_creates_nothing() {
    let h = harness();
    let mut input = ana_submission();
    input.email = None;

    let result = h.lifecycle.submit_quotation(&h.customer, input).await;
    match result {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "email"),
        other => panic!("expected validation error, got {:?}", other),
    }

    assert_eq!(h.store.quotation_count().await, 0);
    assert!(h
        .lifecycle
        .list_own_quotations(&h.customer)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_anonymous_caller_is_sent_to_sign_in() {
    let h = harness();
    let result = h
        .lifecycle
        .submit_quotation(&Caller::Anonymous, ana_submission())
        .await;
    match result {
        Err(AppError::Unauthenticated { redirect }) => assert_eq!(redirect, "/auth"),
        other => panic!("expected unauthenticated, got {:?}", other),
    }
    assert!(matches!(
        h.lifecycle.list_own_quotations(&Caller::Anonymous).await,
        Err(AppError::Unauthenticated { .. })
    ));
}

#[tokio::test]
async fn test_update_unknown_id_is_not_found() {
    let h = harness();
    let result = h
        .lifecycle
        .update_quotation(
            &h.admin,
            Uuid::new_v4(),
            AdminPatch::default().with_admin_notes("checked"),
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_update() {
    let h = harness_with(
        RecordingNotifier {
            fail: true,
            ..Default::default()
        },
        TransitionPolicy::Lenient,
    );
    let created = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();

    let quoted = h
        .lifecycle
        .update_quotation(
            &h.admin,
            created.id,
            AdminPatch::default().with_status(QuotationStatus::Quoted),
        )
        .await
        .unwrap();
    assert_eq!(quoted.status, QuotationStatus::Quoted);
    assert_eq!(h.notifier.sent.lock().await.len(), 1);

    let all = h.lifecycle.list_all_quotations(&h.admin).await.unwrap();
    assert_eq!(all[0].status, QuotationStatus::Quoted);
}

#[tokio::test]
async fn test_storage_outage_surfaces_and_leaves_no_record() {
    let h = harness();
    h.store.set_unavailable(true);

    let result = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err.root(), AppError::Storage(_)));
    assert!(err.is_retryable());

    h.store.set_unavailable(false);
    assert_eq!(h.store.quotation_count().await, 0);
}

#[tokio::test]
async fn test_listings_are_newest_first_and_scoped_to_owner() {
    let h = harness();
    let other = Caller::User {
        user_id: Uuid::new_v4(),
    };

    let first = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();
    let mut input = ana_submission();
    input.route_id = Some("camino-primitivo".to_string());
    let second = h
        .lifecycle
        .submit_quotation(&h.customer, input)
        .await
        .unwrap();
    h.lifecycle
        .submit_quotation(&other, ana_submission())
        .await
        .unwrap();

    let own = h.lifecycle.list_own_quotations(&h.customer).await.unwrap();
    let ids: Vec<Uuid> = own.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let all = h.lifecycle.list_all_quotations(&h.admin).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(matches!(
        h.lifecycle.list_all_quotations(&h.customer).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_admin_notes_hidden_from_customer() {
    let h = harness();
    let created = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();
    h.lifecycle
        .update_quotation(
            &h.admin,
            created.id,
            AdminPatch::default().with_admin_notes("asked for a discount"),
        )
        .await
        .unwrap();

    let own = h.lifecycle.list_own_quotations(&h.customer).await.unwrap();
    assert!(own[0].admin_notes.is_none());

    let all = h.lifecycle.list_all_quotations(&h.admin).await.unwrap();
    assert_eq!(all[0].admin_notes.as_deref(), Some("asked for a discount"));
}

#[tokio::test]
async fn test_strict_policy_blocks_reopening_completed_trip() {
    let h = harness_with(RecordingNotifier::default(), TransitionPolicy::Strict);
    let created = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();

    for status in [
        QuotationStatus::Quoted,
        QuotationStatus::Accepted,
        QuotationStatus::Completed,
    ] {
        h.lifecycle
            .update_quotation(&h.admin, created.id, AdminPatch::default().with_status(status))
            .await
            .unwrap();
    }

    let result = h
        .lifecycle
        .update_quotation(
            &h.admin,
            created.id,
            AdminPatch::default().with_status(QuotationStatus::OpenForQuotation),
        )
        .await;
    match result {
        Err(AppError::Validation { field, .. }) => assert_eq!(field, "status"),
        other => panic!("expected validation error, got {:?}", other),
    }

    let all = h.lifecycle.list_all_quotations(&h.admin).await.unwrap();
    assert_eq!(all[0].status, QuotationStatus::Completed);
}

#[tokio::test]
async fn test_stats_count_every_status() {
    let h = harness();
    let a = h
        .lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();
    h.lifecycle
        .submit_quotation(&h.customer, ana_submission())
        .await
        .unwrap();
    h.lifecycle
        .update_quotation(
            &h.admin,
            a.id,
            AdminPatch::default().with_status(QuotationStatus::Quoted),
        )
        .await
        .unwrap();

    let stats = h.lifecycle.quotation_stats(&h.admin).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.open, 1);
    assert_eq!(stats.quoted, 1);
    assert_eq!(stats.completed, 0);
    assert!(matches!(
        h.lifecycle.quotation_stats(&h.customer).await,
        Err(AppError::Forbidden(_))
    ));
}
