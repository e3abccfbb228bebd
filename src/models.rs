use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Quotation lifecycle ============

/// Status of a quotation request.
///
/// Persisted as its SCREAMING_SNAKE_CASE name in `quotations.status`, which the
/// backend stores as free text. Anything outside these five values is rejected
/// when a row is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    OpenForQuotation,
    Quoted,
    Accepted,
    Rejected,
    Completed,
}

impl QuotationStatus {
    pub const ALL: [QuotationStatus; 5] = [
        QuotationStatus::OpenForQuotation,
        QuotationStatus::Quoted,
        QuotationStatus::Accepted,
        QuotationStatus::Rejected,
        QuotationStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::OpenForQuotation => "OPEN_FOR_QUOTATION",
            QuotationStatus::Quoted => "QUOTED",
            QuotationStatus::Accepted => "ACCEPTED",
            QuotationStatus::Rejected => "REJECTED",
            QuotationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuotationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown quotation status '{}'", s))
    }
}

/// Accommodation style the customer would like quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccommodationPreference {
    Albergue,
    Hostal,
    Hotel,
    Mixed,
}

impl AccommodationPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccommodationPreference::Albergue => "albergue",
            AccommodationPreference::Hostal => "hostal",
            AccommodationPreference::Hotel => "hotel",
            AccommodationPreference::Mixed => "mixed",
        }
    }
}

impl FromStr for AccommodationPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "albergue" => Ok(AccommodationPreference::Albergue),
            "hostal" => Ok(AccommodationPreference::Hostal),
            "hotel" => Ok(AccommodationPreference::Hotel),
            "mixed" => Ok(AccommodationPreference::Mixed),
            other => Err(format!(
                "'{}' is not one of albergue, hostal, hotel, mixed",
                other
            )),
        }
    }
}

/// One customer trip inquiry plus the admin's response to it.
///
/// Field names mirror the `quotations` table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationRequest {
    pub id: Uuid,
    /// Owning identity. Set once at creation.
    pub user_id: Uuid,
    /// Route Catalog id. Not checked against the catalog.
    pub route_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub number_of_people: i32,
    pub accommodation_preference: Option<AccommodationPreference>,
    pub special_requirements: Option<String>,
    pub status: QuotationStatus,
    /// Customer-visible quote text, written by an admin.
    pub quote_details: Option<String>,
    /// Internal notes, never shown to the customer.
    pub admin_notes: Option<String>,
    pub total_price: Option<BigDecimal>,
    /// Set the first time the record becomes QUOTED and never cleared.
    pub quoted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotationRequest {
    /// The record as its owning customer may see it (admin notes removed).
    pub fn customer_view(mut self) -> Self {
        self.admin_notes = None;
        self
    }
}

/// Raw quotation request form as posted by the customer.
///
/// Every field is optional at the wire level so that a missing field surfaces
/// as a field-level validation error instead of a body rejection. Unknown
/// fields (including any attempt to set `status`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuotationInput {
    pub route_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub number_of_people: Option<i64>,
    pub accommodation_preference: Option<String>,
    pub special_requirements: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub route_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub number_of_people: i32,
    pub accommodation_preference: Option<AccommodationPreference>,
    pub special_requirements: Option<String>,
}

/// Admin update payload. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPatch {
    pub status: Option<String>,
    pub quote_details: Option<String>,
    pub admin_notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub total_price: Option<BigDecimal>,
}

impl AdminPatch {
    pub fn with_status(mut self, status: QuotationStatus) -> Self {
        self.status = Some(status.as_str().to_string());
        self
    }

    pub fn with_quote_details(mut self, details: impl Into<String>) -> Self {
        self.quote_details = Some(details.into());
        self
    }

    pub fn with_admin_notes(mut self, notes: impl Into<String>) -> Self {
        self.admin_notes = Some(notes.into());
        self
    }

    pub fn with_total_price(mut self, price: BigDecimal) -> Self {
        self.total_price = Some(price);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.quote_details.is_none()
            && self.admin_notes.is_none()
            && self.total_price.is_none()
    }
}

/// Reads a money amount posted either as a JSON number or a decimal string.
///
/// Numbers are parsed from their shortest decimal text so `1200.10` arrives as
/// `1200.1` instead of the nearest binary fraction.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(serde_json::Number),
        Text(String),
    }

    let text = match Option::<RawAmount>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(RawAmount::Number(n)) => n.to_string(),
        Some(RawAmount::Text(s)) => s.trim().to_string(),
    };
    BigDecimal::from_str(&text)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("invalid amount: {}", text)))
}

/// Column values written by one admin update, all persisted together.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotationUpdate {
    pub status: QuotationStatus,
    pub quote_details: Option<String>,
    pub admin_notes: Option<String>,
    pub total_price: Option<BigDecimal>,
    pub quoted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Counts shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuotationStats {
    pub total: usize,
    pub open: usize,
    pub quoted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub completed: usize,
}

impl QuotationStats {
    pub fn from_records(records: &[QuotationRequest]) -> Self {
        records
            .iter()
            .fold(QuotationStats::default(), |mut stats, record| {
                stats.total += 1;
                match record.status {
                    QuotationStatus::OpenForQuotation => stats.open += 1,
                    QuotationStatus::Quoted => stats.quoted += 1,
                    QuotationStatus::Accepted => stats.accepted += 1,
                    QuotationStatus::Rejected => stats.rejected += 1,
                    QuotationStatus::Completed => stats.completed += 1,
                }
                stats
            })
    }
}

// ============ Identity ============

/// Role rows from `user_roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// Display data for an identity. Read only, never touched by the lifecycle.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ Route stages ============

/// One day's segment of a route, as stored in `route_stages`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RouteStage {
    pub id: Uuid,
    pub route_id: String,
    pub stage_number: i32,
    pub name: String,
    pub description: Option<String>,
    pub detailed_description: Option<String>,
    pub distance: f64,
    pub estimated_time: Option<String>,
    pub difficulty: String,
    pub terrain_type: Option<String>,
    pub elevation_gain: Option<i32>,
    pub elevation_loss: Option<i32>,
    pub start_point: String,
    pub end_point: String,
    pub points_of_interest: Option<Vec<String>>,
    pub accommodations: Option<serde_json::Value>,
    pub services: Option<serde_json::Value>,
    pub warnings: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub map_url: Option<String>,
}
