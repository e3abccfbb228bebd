use crate::errors::{AppError, ResultExt};
use crate::models::{
    AccommodationPreference, QuotationRequest, QuotationStatus, QuotationUpdate, Role, RouteStage,
    UserProfile,
};
use crate::storage::QuotationStore;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const QUOTATION_COLUMNS: &str = "id, user_id, route_id, full_name, email, phone, start_date, \
    end_date, number_of_people, accommodation_preference, special_requirements, status, \
    quote_details, admin_notes, total_price, quoted_at, created_at, updated_at";

/// Raw `quotations` row. `status` and `accommodation_preference` are free text
/// in the backend schema and are checked on conversion.
#[derive(Debug, FromRow)]
struct QuotationRow {
    id: Uuid,
    user_id: Uuid,
    route_id: String,
    full_name: String,
    email: String,
    phone: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    number_of_people: i32,
    accommodation_preference: Option<String>,
    special_requirements: Option<String>,
    status: String,
    quote_details: Option<String>,
    admin_notes: Option<String>,
    total_price: Option<BigDecimal>,
    quoted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuotationRow> for QuotationRequest {
    type Error = AppError;

    fn try_from(row: QuotationRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<QuotationStatus>().map_err(|e| {
            AppError::Storage(format!("quotation {} has invalid status: {}", row.id, e))
        })?;

        // Legacy rows may carry values outside the enumeration; treat them as unset.
        let accommodation_preference = match row.accommodation_preference.as_deref() {
            None | Some("") => None,
            Some(raw) => match raw.parse::<AccommodationPreference>() {
                Ok(pref) => Some(pref),
                Err(e) => {
                    tracing::warn!(quotation_id = %row.id, "Ignoring accommodation preference: {}", e);
                    None
                }
            },
        };

        Ok(QuotationRequest {
            id: row.id,
            user_id: row.user_id,
            route_id: row.route_id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            start_date: row.start_date,
            end_date: row.end_date,
            number_of_people: row.number_of_people,
            accommodation_preference,
            special_requirements: row.special_requirements,
            status,
            quote_details: row.quote_details,
            admin_notes: row.admin_notes,
            total_price: row.total_price,
            quoted_at: row.quoted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_rows(rows: Vec<QuotationRow>) -> Result<Vec<QuotationRequest>, AppError> {
    rows.into_iter().map(QuotationRequest::try_from).collect()
}

/// `QuotationStore` backed by the managed Postgres database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotationStore for PgStore {
    async fn insert_quotation(&self, record: QuotationRequest) -> Result<QuotationRequest, AppError> {
        let sql = format!(
            r#"
            INSERT INTO public.quotations (
                id, user_id, route_id, full_name, email, phone, start_date, end_date,
                number_of_people, accommodation_preference, special_requirements, status,
                quote_details, admin_notes, total_price, quoted_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {QUOTATION_COLUMNS}
            "#
        );

        let row: QuotationRow = sqlx::query_as(&sql)
            .bind(record.id)
            .bind(record.user_id)
            .bind(&record.route_id)
            .bind(&record.full_name)
            .bind(&record.email)
            .bind(&record.phone)
            .bind(record.start_date)
            .bind(record.end_date)
            .bind(record.number_of_people)
            .bind(record.accommodation_preference.map(|p| p.as_str()))
            .bind(&record.special_requirements)
            .bind(record.status.as_str())
            .bind(&record.quote_details)
            .bind(&record.admin_notes)
            .bind(&record.total_price)
            .bind(record.quoted_at)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert quotation")?;

        QuotationRequest::try_from(row)
    }

    async fn find_quotation(&self, id: Uuid) -> Result<Option<QuotationRequest>, AppError> {
        let sql = format!("SELECT {QUOTATION_COLUMNS} FROM public.quotations WHERE id = $1");
        let row: Option<QuotationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to load quotation {}", id))?;

        row.map(QuotationRequest::try_from).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<QuotationRequest>, AppError> {
        let sql = format!(
            "SELECT {QUOTATION_COLUMNS} FROM public.quotations WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<QuotationRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list quotations for user")?;

        convert_rows(rows)
    }

    async fn list_all(&self) -> Result<Vec<QuotationRequest>, AppError> {
        let sql =
            format!("SELECT {QUOTATION_COLUMNS} FROM public.quotations ORDER BY created_at DESC");
        let rows: Vec<QuotationRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list quotations")?;

        convert_rows(rows)
    }

    async fn apply_update(
        &self,
        id: Uuid,
        update: QuotationUpdate,
    ) -> Result<Option<QuotationRequest>, AppError> {
        let sql = format!(
            r#"
            UPDATE public.quotations
            SET status = $2,
                quote_details = $3,
                admin_notes = $4,
                total_price = $5,
                quoted_at = COALESCE(quoted_at, $6),
                updated_at = $7
            WHERE id = $1
            RETURNING {QUOTATION_COLUMNS}
            "#
        );

        let row: Option<QuotationRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(update.status.as_str())
            .bind(&update.quote_details)
            .bind(&update.admin_notes)
            .bind(&update.total_price)
            .bind(update.quoted_at)
            .bind(update.updated_at)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to update quotation {}", id))?;

        row.map(QuotationRequest::try_from).transpose()
    }

    async fn has_role(&self, user_id: Uuid, role: Role) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM public.user_roles WHERE user_id = $1 AND role::text = $2)",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to look up user role")?;

        Ok(exists)
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, user_id, email, full_name, phone, created_at, updated_at
            FROM public.profiles
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load profile")
    }

    async fn list_route_stages(&self, route_id: &str) -> Result<Vec<RouteStage>, AppError> {
        sqlx::query_as::<_, RouteStage>(
            r#"
            SELECT id, route_id, stage_number::int4 AS stage_number, name, description, detailed_description,
                   distance::float8 AS distance, estimated_time, difficulty, terrain_type,
                   elevation_gain::int4 AS elevation_gain, elevation_loss::int4 AS elevation_loss, start_point, end_point, points_of_interest,
                   accommodations, services, warnings, images, map_url
            FROM public.route_stages
            WHERE route_id = $1
            ORDER BY stage_number
            "#,
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load route stages")
    }
}
