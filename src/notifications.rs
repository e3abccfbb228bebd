//! Notification Hook: tells a customer their quotation is ready.
//!
//! Delivery is best-effort. Callers log a `NotificationError` and carry on;
//! nothing in the quotation lifecycle waits on, or rolls back because of, a
//! notification.

use crate::circuit_breaker::{create_notification_circuit_breaker, NotificationCircuitBreaker};
use crate::errors::AppError;
use crate::models::{deserialize_amount, QuotationRequest};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use failsafe::futures::CircuitBreaker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What the hook needs to write to the customer.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub quotation_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub route_name: String,
    pub quote_details: String,
    pub total_price: Option<BigDecimal>,
}

impl NotificationPayload {
    pub fn for_quotation(record: &QuotationRequest, route_name: impl Into<String>) -> Self {
        Self {
            quotation_id: record.id,
            customer_email: record.email.clone(),
            customer_name: record.full_name.clone(),
            route_name: route_name.into(),
            quote_details: record.quote_details.clone().unwrap_or_default(),
            total_price: record.total_price.clone(),
        }
    }

    pub fn to_request(&self) -> QuotationEmailRequest {
        QuotationEmailRequest {
            quotation_id: self.quotation_id.to_string(),
            customer_email: self.customer_email.clone(),
            customer_name: self.customer_name.clone(),
            route_name: self.route_name.clone(),
            quote_details: self.quote_details.clone(),
            total_price: self.total_price.clone(),
        }
    }
}

/// Request body of the `send-quotation-email` function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationEmailRequest {
    pub quotation_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub route_name: String,
    pub quote_details: String,
    #[serde(
        default,
        deserialize_with = "deserialize_amount",
        serialize_with = "serialize_amount"
    )]
    pub total_price: Option<BigDecimal>,
}

/// The hook expects `totalPrice` as a JSON number.
fn serialize_amount<S>(amount: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match amount.as_ref().and_then(|a| a.to_f64()) {
        Some(value) => serializer.serialize_some(&value),
        None => serializer.serialize_none(),
    }
}

/// Response body of the `send-quotation-email` function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationEmailResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quotation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationError {
    /// The hook answered but reported failure.
    Rejected(String),
    /// The hook could not be reached or answered garbage.
    Transport(String),
    /// Too many recent failures; the call was not attempted.
    CircuitOpen,
    /// The outbox is full.
    QueueFull,
    /// The outbox worker has stopped.
    QueueClosed,
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::Rejected(msg) => write!(f, "notification rejected: {}", msg),
            NotificationError::Transport(msg) => write!(f, "notification transport error: {}", msg),
            NotificationError::CircuitOpen => write!(f, "notification channel circuit open"),
            NotificationError::QueueFull => write!(f, "notification outbox full"),
            NotificationError::QueueClosed => write!(f, "notification outbox closed"),
        }
    }
}

impl std::error::Error for NotificationError {}

#[async_trait]
pub trait QuotationNotifier: Send + Sync {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotificationError>;
}

/// Customer email text for a quotation.
pub fn render_quotation_email(request: &QuotationEmailRequest) -> String {
    let price = match &request.total_price {
        Some(price) => format!("€{}", price.round(2).with_scale(2)),
        None => "to be confirmed".to_string(),
    };

    format!(
        "Dear {name},\n\n\
         Thank you for your interest in our {route} Camino route!\n\n\
         We are pleased to provide you with the following quotation:\n\n\
         {details}\n\n\
         Total Price: {price}\n\n\
         To proceed with your booking or if you have any questions, please contact us at your earliest convenience.\n\n\
         We look forward to helping you create an unforgettable Camino experience!\n\n\
         Best regards,\n\
         The Camino Team\n",
        name = request.customer_name,
        route = request.route_name,
        details = request.quote_details,
        price = price,
    )
}

/// Stub hook: renders the email and logs it instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl QuotationNotifier for LogOnlyNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        let request = payload.to_request();
        tracing::info!(
            quotation_id = %payload.quotation_id,
            "Sending quotation email to: {}",
            request.customer_email
        );
        tracing::info!("Email content:\n{}", render_quotation_email(&request));
        Ok(())
    }
}

/// Calls the backend's `send-quotation-email` edge function.
#[derive(Clone)]
pub struct EdgeFunctionNotifier {
    client: reqwest::Client,
    endpoint: url::Url,
    service_key: String,
    breaker: NotificationCircuitBreaker,
}

impl EdgeFunctionNotifier {
    /// Creates a notifier for the function hosted under `base_url`.
    pub fn new(base_url: &str, service_key: String) -> Result<Self, AppError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = url::Url::parse(&base)
            .and_then(|u| u.join("functions/v1/send-quotation-email"))
            .map_err(|e| AppError::InternalError(format!("Invalid edge function URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create notification client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            service_key,
            breaker: create_notification_circuit_breaker(),
        })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    async fn send(&self, request: QuotationEmailRequest) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        let body: QuotationEmailResponse = response.json().await.map_err(|e| {
            NotificationError::Transport(format!("unreadable response ({}): {}", status, e))
        })?;

        if status.is_success() && body.success {
            Ok(())
        } else {
            Err(NotificationError::Rejected(
                body.error
                    .or(body.message)
                    .unwrap_or_else(|| format!("status {}", status)),
            ))
        }
    }
}

#[async_trait]
impl QuotationNotifier for EdgeFunctionNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        match self.breaker.call(self.send(payload.to_request())).await {
            Ok(()) => {
                tracing::info!(quotation_id = %payload.quotation_id, "Quotation email dispatched");
                Ok(())
            }
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(NotificationError::CircuitOpen),
        }
    }
}

/// Outbox in front of another notifier.
///
/// `notify` only enqueues; a background worker drains the queue into the inner
/// notifier and logs delivery failures. An unavailable channel therefore never
/// shows up as latency or failure on the update that triggered it.
#[derive(Clone)]
pub struct QueuedNotifier {
    tx: mpsc::Sender<NotificationPayload>,
}

impl QueuedNotifier {
    /// Starts the worker on the current runtime.
    pub fn spawn(inner: Arc<dyn QuotationNotifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<NotificationPayload>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(e) = inner.notify(&payload).await {
                    tracing::error!(
                        quotation_id = %payload.quotation_id,
                        "Quotation notification failed: {}",
                        e
                    );
                }
            }
            tracing::debug!("Notification outbox drained, worker stopping");
        });
        (Self { tx }, worker)
    }
}

#[async_trait]
impl QuotationNotifier for QueuedNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        self.tx.try_send(payload.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotificationError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotificationError::QueueClosed,
        })
    }
}
