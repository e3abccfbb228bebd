//! In-process stand-in for the `send-quotation-email` function.
//!
//! Accepts the same request the edge-function notifier sends, renders the
//! email and logs it instead of delivering it. Only the notifier (bearing the
//! service-role key) and admins may call it.

use crate::auth::bearer_token;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::notifications::{render_quotation_email, QuotationEmailRequest, QuotationEmailResponse};
use crate::site_gate::constant_time_compare;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// POST /api/v1/notifications/quotation-email
///
/// # Returns
///
/// * `200` with `{success, message, quotationId}` once the email is rendered.
/// * `401` / `403` when the caller is neither the notifier nor an admin.
/// * `500` with `{success: false, error}` when the body cannot be parsed.
pub async fn quotation_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = authorize_sender(&state, &headers).await {
        return e.into_response();
    }
    let (status, response) = respond(&body);
    (status, Json(response)).into_response()
}

async fn authorize_sender(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if let (Some(expected), Some(token)) =
        (state.notification_service_key.as_deref(), bearer_token(headers))
    {
        if constant_time_compare(token, expected) {
            return Ok(());
        }
    }

    let caller = state.auth.resolve(headers).await?;
    caller.require_admin(&state.auth_redirect)?;
    Ok(())
}

fn respond(body: &[u8]) -> (StatusCode, QuotationEmailResponse) {
    let request: QuotationEmailRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("Error in send-quotation-email function: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                QuotationEmailResponse {
                    success: false,
                    message: None,
                    error: Some(e.to_string()),
                    quotation_id: None,
                },
            );
        }
    };

    tracing::info!(
        quotation_id = %request.quotation_id,
        to = %request.customer_email,
        "Sending quotation email"
    );
    tracing::debug!("Email content:\n{}", render_quotation_email(&request));

    (
        StatusCode::OK,
        QuotationEmailResponse {
            success: true,
            message: Some("Email sent successfully".to_string()),
            error: None,
            quotation_id: Some(request.quotation_id),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_request() {
        let body = br#"{"quotationId":"q-1","customerEmail":"a@b.com","customerName":"Ana",
                "routeName":"Camino Frances","quoteDetails":"All inclusive","totalPrice":1250.5}"#;
        let (status, response) = respond(body);
        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        assert_eq!(response.quotation_id.as_deref(), Some("q-1"));
    }

    #[test]
    fn malformed_request_is_a_server_error() {
        let (status, response) = respond(b"{not json");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.success);
        assert!(response.error.is_some());
    }
}
