use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::pin::pin_length_ok;
use crate::db::DbId;
use crate::error::ReportError;
use crate::pdf::looks_like_pdf;
use crate::render::ReportDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InspectionStatus {
    Pending,
    Completed,
}

impl InspectionStatus {
    /// Anything other than `completed` counts as still pending.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("completed") {
            InspectionStatus::Completed
        } else {
            InspectionStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionStatus::Pending => "pending",
            InspectionStatus::Completed => "completed",
        }
    }
}

/// One report row. Artifacts are raw PDF bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
    pub id: DbId,
    pub inspection_id: DbId,
    pub qr_token: String,
    pub unsigned_pdf: Option<Vec<u8>>,
    pub signed_pdf: Option<Vec<u8>>,
    pub is_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by: Option<DbId>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A report joined with everything needed to render, authorize and deliver it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDetails {
    pub report: ReportRecord,
    pub company_id: DbId,
    pub company_name: String,
    pub inspection_status: InspectionStatus,
    pub inspection_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub inspection_data: Value,
    pub photo_urls: Vec<String>,
    pub technician_id: DbId,
    pub technician_name: String,
    pub technician_surname: String,
    pub equipment_name: String,
    pub equipment_type: String,
    pub template: Value,
    pub work_order_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
}

impl ReportDetails {
    pub fn is_completed(&self) -> bool {
        self.inspection_status == InspectionStatus::Completed
    }

    pub fn to_document(&self) -> ReportDocument {
        ReportDocument {
            company_name: self.company_name.clone(),
            customer_name: self.customer_name.clone(),
            work_order_number: self.work_order_number.clone(),
            inspection_date: self.inspection_date,
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            technician_name: self.technician_name.clone(),
            technician_surname: self.technician_surname.clone(),
            equipment_name: self.equipment_name.clone(),
            equipment_type: self.equipment_type.clone(),
            qr_token: self.report.qr_token.clone(),
            template: self.template.clone(),
            inspection_data: self.inspection_data.clone(),
            photo_urls: self.photo_urls.clone(),
        }
    }
}

/// Authenticated report view. Artifact bytes are replaced by presence flags.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub id: DbId,
    pub inspection_id: DbId,
    pub qr_token: String,
    pub is_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by: Option<DbId>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub has_unsigned_pdf: bool,
    pub has_signed_pdf: bool,
    pub inspection_status: InspectionStatus,
    pub inspection_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[schema(value_type = Object)]
    pub inspection_data: Value,
    pub photo_urls: Vec<String>,
    pub equipment_name: String,
    pub equipment_type: String,
    #[schema(value_type = Object)]
    pub template: Value,
    pub technician_name: String,
    pub technician_surname: String,
    pub work_order_number: String,
    pub customer_name: String,
    pub company_name: String,
}

impl From<&ReportDetails> for ReportView {
    fn from(d: &ReportDetails) -> Self {
        Self {
            id: d.report.id,
            inspection_id: d.report.inspection_id,
            qr_token: d.report.qr_token.clone(),
            is_signed: d.report.is_signed,
            signed_at: d.report.signed_at,
            signed_by: d.report.signed_by,
            sent_at: d.report.sent_at,
            created_at: d.report.created_at,
            has_unsigned_pdf: d.report.unsigned_pdf.is_some(),
            has_signed_pdf: d.report.signed_pdf.is_some(),
            inspection_status: d.inspection_status,
            inspection_date: d.inspection_date,
            start_time: d.start_time.clone(),
            end_time: d.end_time.clone(),
            inspection_data: d.inspection_data.clone(),
            photo_urls: d.photo_urls.clone(),
            equipment_name: d.equipment_name.clone(),
            equipment_type: d.equipment_type.clone(),
            template: d.template.clone(),
            technician_name: d.technician_name.clone(),
            technician_surname: d.technician_surname.clone(),
            work_order_number: d.work_order_number.clone(),
            customer_name: d.customer_name.clone(),
            company_name: d.company_name.clone(),
        }
    }
}

/// What a QR scan reveals. Has no artifact fields at all.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicReportView {
    pub qr_token: String,
    pub is_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub inspection_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[schema(value_type = Object)]
    pub inspection_data: Value,
    pub photo_urls: Vec<String>,
    pub equipment_name: String,
    pub equipment_type: String,
    pub technician_name: String,
    pub technician_surname: String,
    pub work_order_number: String,
    pub customer_name: String,
    pub company_name: String,
}

impl From<&ReportDetails> for PublicReportView {
    fn from(d: &ReportDetails) -> Self {
        Self {
            qr_token: d.report.qr_token.clone(),
            is_signed: d.report.is_signed,
            signed_at: d.report.signed_at,
            inspection_date: d.inspection_date,
            start_time: d.start_time.clone(),
            end_time: d.end_time.clone(),
            inspection_data: d.inspection_data.clone(),
            photo_urls: d.photo_urls.clone(),
            equipment_name: d.equipment_name.clone(),
            equipment_type: d.equipment_type.clone(),
            technician_name: d.technician_name.clone(),
            technician_surname: d.technician_surname.clone(),
            work_order_number: d.work_order_number.clone(),
            customer_name: d.customer_name.clone(),
            company_name: d.company_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub signed_pdf_base64: String,
}

/// A sign request that passed input validation.
#[derive(Debug)]
pub struct ValidSignRequest {
    pub pin: String,
    pub signed_pdf: Vec<u8>,
}

impl SignRequest {
    /// Trim the PIN, bound its length and decode the signed artifact.
    pub fn validate(&self) -> Result<ValidSignRequest, ReportError> {
        let mut problems = Vec::new();

        let pin = self.pin.trim();
        if pin.is_empty() || !pin_length_ok(pin) {
            problems.push(serde_json::json!({
                "field": "pin",
                "message": "E-imza PIN'i 4-10 karakter arasında olmalıdır"
            }));
        }

        let signed_pdf = match STANDARD.decode(self.signed_pdf_base64.trim()) {
            Ok(bytes) if !bytes.is_empty() && looks_like_pdf(&bytes) => Some(bytes),
            _ => {
                problems.push(serde_json::json!({
                    "field": "signedPdfBase64",
                    "message": "İmzalanmış PDF gereklidir"
                }));
                None
            }
        };

        match signed_pdf {
            Some(signed_pdf) if problems.is_empty() => Ok(ValidSignRequest {
                pin: pin.to_string(),
                signed_pdf,
            }),
            _ => Err(ReportError::Validation {
                message: "Geçersiz veri".to_string(),
                details: Some(Value::Array(problems)),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SigningData {
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub customer_email: Option<String>,
    pub customer_name: String,
    pub equipment_name: String,
    pub work_order_number: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DownloadQuery {
    #[serde(default)]
    pub signed: Option<String>,
}

impl DownloadQuery {
    pub fn wants_signed(&self) -> bool {
        matches!(self.signed.as_deref(), Some("true") | Some("1"))
    }
}

/// Bytes plus the attachment name for a download.
#[derive(Debug, Clone)]
pub struct PdfDownload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PdfDownload {
    /// Attachment header with an ASCII `filename` and the exact UTF-8 `filename*`.
    pub fn content_disposition(&self) -> ContentDisposition {
        let ascii: String = self
            .filename
            .chars()
            .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
            .collect();
        ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![
                DispositionParam::Filename(ascii),
                DispositionParam::FilenameExt(ExtendedValue {
                    charset: Charset::Ext("UTF-8".to_string()),
                    language_tag: None,
                    value: self.filename.as_bytes().to_vec(),
                }),
            ],
        }
    }
}

pub fn encode_pdf(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(pin: &str, pdf: &[u8]) -> SignRequest {
        SignRequest {
            pin: pin.to_string(),
            signed_pdf_base64: STANDARD.encode(pdf),
        }
    }

    #[test]
    fn test_sign_request_trims_pin() {
        let valid = request("  1234 ", b"%PDF-1.7 signed").validate().unwrap();
        assert_eq!(valid.pin, "1234");
        assert_eq!(valid.signed_pdf, b"%PDF-1.7 signed");
    }

    #[test]
    fn test_sign_request_rejects_short_pin_and_bad_pdf() {
        let err = request("12", b"not a pdf").validate().unwrap_err();
        match err {
            ReportError::Validation { details, .. } => {
                assert_eq!(details.unwrap().as_array().unwrap().len(), 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sign_request_rejects_invalid_base64() {
        let req = SignRequest {
            pin: "1234".to_string(),
            signed_pdf_base64: "@@@".to_string(),
        };
        assert!(matches!(req.validate(), Err(ReportError::Validation { .. })));
    }

    #[test]
    fn test_download_query_flag() {
        assert!(DownloadQuery { signed: Some("true".into()) }.wants_signed());
        assert!(!DownloadQuery { signed: Some("false".into()) }.wants_signed());
        assert!(!DownloadQuery { signed: None }.wants_signed());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(InspectionStatus::parse("completed"), InspectionStatus::Completed);
        assert_eq!(InspectionStatus::parse("pending"), InspectionStatus::Pending);
        assert_eq!(InspectionStatus::parse("in_progress"), InspectionStatus::Pending);
    }

    #[test]
    fn test_download_header_keeps_utf8_name() {
        let download = PdfDownload {
            filename: "Kaldırma Aracı_WO-7.pdf".to_string(),
            bytes: Vec::new(),
        };
        let header = download.content_disposition().to_string();
        assert!(header.starts_with("attachment; "));
        assert!(header.contains("filename=\"Kald_rma Arac__WO-7.pdf\""));
        assert!(header.contains("filename*=UTF-8''Kald%C4%B1rma"));
    }
}
