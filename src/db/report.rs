//! Report database operations

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;

use super::{DbId, StoreError};
use crate::reports::model::{InspectionStatus, ReportDetails, ReportRecord};
use crate::reports::ReportStore;

/// Artifacts live in base64 text columns; they are decoded here and never
/// leave this module as text.
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.inspection_id, r.qr_token,
           r.unsigned_pdf_base64, r.signed_pdf_base64,
           r.is_signed, r.signed_at, r.signed_by, r.sent_at, r.created_at,
           wo.company_id, comp.name AS company_name,
           i.status::text AS inspection_status,
           i.inspection_date::date AS inspection_date,
           i.start_time::text AS start_time, i.end_time::text AS end_time,
           i.inspection_data::jsonb AS inspection_data,
           to_jsonb(i.photo_urls) AS photo_urls,
           t.id AS technician_id, t.name AS technician_name, t.surname AS technician_surname,
           e.name AS equipment_name, e.type AS equipment_type, e.template::jsonb AS template,
           wo.work_order_number, cc.name AS customer_name, cc.email AS customer_email
    FROM reports r
    JOIN inspections i ON r.inspection_id = i.id
    JOIN equipment e ON i.equipment_id = e.id
    JOIN technicians t ON i.technician_id = t.id
    JOIN work_orders wo ON i.work_order_id = wo.id
    JOIN customer_companies cc ON wo.customer_company_id = cc.id
    JOIN companies comp ON wo.company_id = comp.id
"#;

#[derive(sqlx::FromRow)]
struct DetailsRow {
    id: DbId,
    inspection_id: DbId,
    qr_token: String,
    unsigned_pdf_base64: Option<String>,
    signed_pdf_base64: Option<String>,
    is_signed: bool,
    signed_at: Option<DateTime<Utc>>,
    signed_by: Option<DbId>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    company_id: DbId,
    company_name: String,
    inspection_status: Option<String>,
    inspection_date: Option<NaiveDate>,
    start_time: Option<String>,
    end_time: Option<String>,
    inspection_data: Option<Value>,
    photo_urls: Option<Value>,
    technician_id: DbId,
    technician_name: Option<String>,
    technician_surname: Option<String>,
    equipment_name: Option<String>,
    equipment_type: Option<String>,
    template: Option<Value>,
    work_order_number: Option<String>,
    customer_name: Option<String>,
    customer_email: Option<String>,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: DbId,
    inspection_id: DbId,
    qr_token: String,
    unsigned_pdf_base64: Option<String>,
    signed_pdf_base64: Option<String>,
    is_signed: bool,
    signed_at: Option<DateTime<Utc>>,
    signed_by: Option<DbId>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn decode_artifact(id: DbId, raw: Option<String>) -> Result<Option<Vec<u8>>, StoreError> {
    match raw {
        Some(text) if !text.is_empty() => STANDARD
            .decode(text.trim())
            .map(Some)
            .map_err(|_| StoreError::CorruptArtifact(id)),
        _ => Ok(None),
    }
}

impl TryFrom<RecordRow> for ReportRecord {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(ReportRecord {
            id: row.id,
            inspection_id: row.inspection_id,
            qr_token: row.qr_token,
            unsigned_pdf: decode_artifact(row.id, row.unsigned_pdf_base64)?,
            signed_pdf: decode_artifact(row.id, row.signed_pdf_base64)?,
            is_signed: row.is_signed,
            signed_at: row.signed_at,
            signed_by: row.signed_by,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<DetailsRow> for ReportDetails {
    type Error = StoreError;

    fn try_from(row: DetailsRow) -> Result<Self, Self::Error> {
        let photo_urls = match row.photo_urls {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let report = ReportRecord::try_from(RecordRow {
            id: row.id,
            inspection_id: row.inspection_id,
            qr_token: row.qr_token,
            unsigned_pdf_base64: row.unsigned_pdf_base64,
            signed_pdf_base64: row.signed_pdf_base64,
            is_signed: row.is_signed,
            signed_at: row.signed_at,
            signed_by: row.signed_by,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })?;

        Ok(ReportDetails {
            report,
            company_id: row.company_id,
            company_name: row.company_name,
            inspection_status: InspectionStatus::parse(
                row.inspection_status.as_deref().unwrap_or_default(),
            ),
            inspection_date: row.inspection_date,
            start_time: row.start_time,
            end_time: row.end_time,
            inspection_data: row.inspection_data.unwrap_or(Value::Null),
            photo_urls,
            technician_id: row.technician_id,
            technician_name: row.technician_name.unwrap_or_default(),
            technician_surname: row.technician_surname.unwrap_or_default(),
            equipment_name: row.equipment_name.unwrap_or_default(),
            equipment_type: row.equipment_type.unwrap_or_default(),
            template: row.template.unwrap_or(Value::Null),
            work_order_number: row.work_order_number.unwrap_or_default(),
            customer_name: row.customer_name.unwrap_or_default(),
            customer_email: row.customer_email,
        })
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn find_details(&self, id: DbId) -> Result<Option<ReportDetails>, StoreError> {
        let sql = format!("{} WHERE r.id = $1", DETAILS_SELECT);
        let row = sqlx::query_as::<_, DetailsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ReportDetails::try_from).transpose()
    }

    async fn find_signed_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ReportDetails>, StoreError> {
        let sql = format!(
            "{} WHERE r.qr_token = $1 AND r.is_signed = true",
            DETAILS_SELECT
        );
        let row = sqlx::query_as::<_, DetailsRow>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ReportDetails::try_from).transpose()
    }

    async fn store_unsigned(&self, id: DbId, pdf: &[u8]) -> Result<(), StoreError> {
        sqlx::query("UPDATE reports SET unsigned_pdf_base64 = $1 WHERE id = $2")
            .bind(STANDARD.encode(pdf))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_signed(
        &self,
        id: DbId,
        signed_pdf: &[u8],
        signed_by: DbId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET signed_pdf_base64 = $1, is_signed = true,
                signed_at = CURRENT_TIMESTAMP, signed_by = $2
            WHERE id = $3 AND is_signed = false
            "#,
        )
        .bind(STANDARD.encode(signed_pdf))
        .bind(signed_by)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_sent(&self, id: DbId) -> Result<(), StoreError> {
        sqlx::query("UPDATE reports SET sent_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn technician_pin(
        &self,
        technician_id: DbId,
        company_id: DbId,
    ) -> Result<Option<String>, StoreError> {
        let pin: Option<Option<String>> = sqlx::query_scalar(
            "SELECT e_signature_pin FROM technicians WHERE id = $1 AND company_id = $2",
        )
        .bind(technician_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pin.flatten())
    }

    async fn inspection_status(
        &self,
        inspection_id: DbId,
        company_id: DbId,
    ) -> Result<Option<InspectionStatus>, StoreError> {
        let status: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT i.status::text
            FROM inspections i
            JOIN work_orders wo ON i.work_order_id = wo.id
            WHERE i.id = $1 AND wo.company_id = $2
            "#,
        )
        .bind(inspection_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status.map(|s| InspectionStatus::parse(s.as_deref().unwrap_or_default())))
    }

    async fn create_for_inspection(
        &self,
        inspection_id: DbId,
        qr_token: &str,
    ) -> Result<ReportRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reports (inspection_id, qr_token)
            VALUES ($1, $2)
            ON CONFLICT (inspection_id) DO NOTHING
            "#,
        )
        .bind(inspection_id)
        .bind(qr_token)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, inspection_id, qr_token, unsigned_pdf_base64, signed_pdf_base64,
                   is_signed, signed_at, signed_by, sent_at, created_at
            FROM reports WHERE inspection_id = $1
            "#,
        )
        .bind(inspection_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::MissingInspection(inspection_id))?;
        ReportRecord::try_from(row)
    }
}
