/// Property-based tests using proptest
/// Tests invariants of the quotation lifecycle that should hold for all inputs
use camino_api::auth::Caller;
use camino_api::catalog::RouteCatalog;
use camino_api::lifecycle::QuotationLifecycle;
use camino_api::memory_storage::InMemoryStore;
use camino_api::models::{AdminPatch, QuotationRequest, QuotationStatus, SubmitQuotationInput};
use camino_api::notifications::LogOnlyNotifier;
use camino_api::validation::{is_valid_email, parse_calendar_date};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn lifecycle() -> QuotationLifecycle {
    QuotationLifecycle::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(LogOnlyNotifier),
        Arc::new(RouteCatalog::embedded().unwrap()),
    )
}

fn admin() -> Caller {
    Caller::Admin {
        user_id: Uuid::new_v4(),
    }
}

fn submission() -> SubmitQuotationInput {
    SubmitQuotationInput {
        route_id: Some("camino-del-norte".to_string()),
        full_name: Some("Jon Etxeberria".to_string()),
        email: Some("jon@example.com".to_string()),
        start_date: Some("2025-06-01".to_string()),
        end_date: Some("2025-06-30".to_string()),
        number_of_people: Some(1),
        ..Default::default()
    }
}

async fn submit_one(lifecycle: &QuotationLifecycle, caller: &Caller) -> QuotationRequest {
    lifecycle.submit_quotation(caller, submission()).await.unwrap()
}

fn any_status() -> impl Strategy<Value = QuotationStatus> {
    prop::sample::select(QuotationStatus::ALL.to_vec())
}

// Property: submissions always start OPEN_FOR_QUOTATION
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn submission_ignores_injected_status(injected in "\\PC{0,20}", people in 1i64..=500) {
        let body = serde_json::json!({
            "routeId": "camino-frances",
            "fullName": "Ana Ruiz",
            "email": "ana@example.com",
            "startDate": "2025-05-01",
            "endDate": "2025-05-10",
            "numberOfPeople": people,
            "status": injected,
            "quotedAt": "2025-01-01T00:00:00Z",
        });
        let input: SubmitQuotationInput = serde_json::from_value(body).unwrap();

        let created = runtime().block_on(async {
            let caller = Caller::User { user_id: Uuid::new_v4() };
            lifecycle().submit_quotation(&caller, input).await.unwrap()
        });
        prop_assert_eq!(created.status, QuotationStatus::OpenForQuotation);
        prop_assert!(created.quoted_at.is_none());
    }
}

// Property: quoted_at is stamped on the first QUOTED and never changes afterwards
// Property: updated_at never goes backwards
proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn quoted_at_and_updated_at_over_any_status_walk(
        walk in prop::collection::vec(any_status(), 1..12)
    ) {
        let history = runtime().block_on(async {
            let lifecycle = lifecycle();
            let admin = admin();
            let customer = Caller::User { user_id: Uuid::new_v4() };
            let mut record = submit_one(&lifecycle, &customer).await;
            let mut history = vec![record.clone()];
            for status in walk {
                record = lifecycle
                    .update_quotation(&admin, record.id, AdminPatch::default().with_status(status))
                    .await
                    .unwrap();
                history.push(record.clone());
            }
            history
        });

        let mut first_quoted_at = None;
        for pair in history.windows(2) {
            prop_assert!(pair[1].updated_at > pair[0].updated_at);
        }
        for record in &history {
            match (first_quoted_at, record.quoted_at) {
                (None, None) => prop_assert!(record.status != QuotationStatus::Quoted),
                (None, Some(at)) => first_quoted_at = Some(at),
                (Some(first), Some(at)) => prop_assert_eq!(first, at),
                (Some(_), None) => prop_assert!(false, "quoted_at was cleared"),
            }
        }
    }

    #[test]
    fn quoting_twice_keeps_the_first_stamp(start in any_status()) {
        let (first, second) = runtime().block_on(async {
            let lifecycle = lifecycle();
            let admin = admin();
            let customer = Caller::User { user_id: Uuid::new_v4() };
            let record = submit_one(&lifecycle, &customer).await;
            lifecycle
                .update_quotation(&admin, record.id, AdminPatch::default().with_status(start))
                .await
                .unwrap();
            let quote = AdminPatch::default().with_status(QuotationStatus::Quoted);
            let first = lifecycle.update_quotation(&admin, record.id, quote.clone()).await.unwrap();
            let second = lifecycle.update_quotation(&admin, record.id, quote).await.unwrap();
            (first, second)
        });

        prop_assert_eq!(second.status, QuotationStatus::Quoted);
        prop_assert!(first.quoted_at.is_some());
        prop_assert_eq!(first.quoted_at, second.quoted_at);
    }
}

// Property: owners only ever see their own records
// Property: notes-only patches leave customer-visible fields alone
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn own_listing_is_scoped_to_caller(owners in prop::collection::vec(0usize..4, 1..16)) {
        let ok = runtime().block_on(async {
            let lifecycle = lifecycle();
            let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            for owner in &owners {
                let caller = Caller::User { user_id: users[*owner] };
                submit_one(&lifecycle, &caller).await;
            }

            let mut ok = true;
            for (index, user_id) in users.iter().enumerate() {
                let caller = Caller::User { user_id: *user_id };
                let own = lifecycle.list_own_quotations(&caller).await.unwrap();
                let expected = owners.iter().filter(|o| **o == index).count();
                ok &= own.len() == expected && own.iter().all(|q| q.user_id == *user_id);
            }
            ok
        });
        prop_assert!(ok);
    }

    #[test]
    fn notes_only_patch_is_isolated(notes in "\\PC{1,200}", start in any_status()) {
        let (before, after) = runtime().block_on(async {
            let lifecycle = lifecycle();
            let admin = admin();
            let customer = Caller::User { user_id: Uuid::new_v4() };
            let record = submit_one(&lifecycle, &customer).await;
            let before = lifecycle
                .update_quotation(
                    &admin,
                    record.id,
                    AdminPatch::default().with_status(start).with_quote_details("5 nights, half board"),
                )
                .await
                .unwrap();
            let after = lifecycle
                .update_quotation(&admin, record.id, AdminPatch::default().with_admin_notes(notes))
                .await
                .unwrap();
            (before, after)
        });

        prop_assert_eq!(after.status, before.status);
        prop_assert_eq!(after.quote_details, before.quote_details);
        prop_assert_eq!(after.quoted_at, before.quoted_at);
        prop_assert_eq!(after.total_price, before.total_price);
    }
}

// Property: input parsing never panics
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn date_parsing_never_panics(raw in "\\PC*") {
        let _ = parse_calendar_date("startDate", &raw);
    }

    #[test]
    fn real_calendar_dates_parse(year in 2000i32..2100, month in 1u32..=12, day in 1u32..=28) {
        let raw = format!("{:04}-{:02}-{:02}", year, month, day);
        prop_assert!(parse_calendar_date("startDate", &raw).is_ok());
    }
}
