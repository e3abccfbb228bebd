//! Field validation for customer quotation submissions.
//!
//! Every check runs before anything is written; the first failing field is
//! reported back to the submitter.

use crate::errors::AppError;
use crate::models::{AccommodationPreference, SubmitQuotationInput, ValidatedSubmission};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

const MAX_TEXT_LEN: usize = 5_000;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| {
            // RFC 5322 simplified: local@domain.tld
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
            )
            .ok()
        })
        .as_ref()
}

/// Checks that an address looks deliverable (`local@domain.tld`).
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    match email_regex() {
        Some(re) => re.is_match(email),
        None => !email.contains(char::is_whitespace),
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_calendar_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::validation(
            field,
            format!("'{}' is not a calendar date (expected YYYY-MM-DD)", raw),
        )
    })
}

fn required_text(field: &str, value: Option<&str>) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => {
            if v.len() > MAX_TEXT_LEN {
                return Err(AppError::validation(field, "is too long"));
            }
            Ok(v.to_string())
        }
        _ => Err(AppError::validation(field, "is required")),
    }
}

fn optional_text(field: &str, value: Option<&str>) -> Result<Option<String>, AppError> {
    match value.map(str::trim) {
        Some(v) if v.len() > MAX_TEXT_LEN => Err(AppError::validation(field, "is too long")),
        Some(v) if !v.is_empty() => Ok(Some(v.to_string())),
        _ => Ok(None),
    }
}

/// Validates a raw submission into the fields a new record is built from.
///
/// The trip window is checked for format only; an end date before the start
/// date is accepted and logged.
pub fn validate_submission(input: &SubmitQuotationInput) -> Result<ValidatedSubmission, AppError> {
    let route_id = required_text("routeId", input.route_id.as_deref())?;
    let full_name = required_text("fullName", input.full_name.as_deref())?;
    let email = required_text("email", input.email.as_deref())?;
    if !is_valid_email(&email) {
        return Err(AppError::validation("email", "is not a valid email address"));
    }
    let phone = optional_text("phone", input.phone.as_deref())?;

    let start_raw = required_text("startDate", input.start_date.as_deref())?;
    let start_date = parse_calendar_date("startDate", &start_raw)?;
    let end_raw = required_text("endDate", input.end_date.as_deref())?;
    let end_date = parse_calendar_date("endDate", &end_raw)?;
    if end_date < start_date {
        tracing::warn!(
            route_id = %route_id,
            %start_date,
            %end_date,
            "Accepting quotation with end date before start date"
        );
    }

    let number_of_people = match input.number_of_people {
        Some(n) if n >= 1 => i32::try_from(n)
            .map_err(|_| AppError::validation("numberOfPeople", "is too large"))?,
        Some(_) => return Err(AppError::validation("numberOfPeople", "must be at least 1")),
        None => return Err(AppError::validation("numberOfPeople", "is required")),
    };

    let accommodation_preference = match optional_text(
        "accommodationPreference",
        input.accommodation_preference.as_deref(),
    )? {
        Some(raw) => Some(
            raw.parse::<AccommodationPreference>()
                .map_err(|msg| AppError::validation("accommodationPreference", msg))?,
        ),
        None => None,
    };

    let special_requirements =
        optional_text("specialRequirements", input.special_requirements.as_deref())?;

    Ok(ValidatedSubmission {
        route_id,
        full_name,
        email,
        phone,
        start_date,
        end_date,
        number_of_people,
        accommodation_preference,
        special_requirements,
    })
}
