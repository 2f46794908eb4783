#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;

use inspection_report_server::auth::{AuthContext, JwtKeys, Permission};
use inspection_report_server::config::PdfConfig;
use inspection_report_server::pdf::{PdfError, PdfOptions, RenderingEngine};
use inspection_report_server::reports::model::{InspectionStatus, ReportDetails, ReportRecord};
use inspection_report_server::reports::MemoryReportStore;
use inspection_report_server::AppState;

pub const COMPANY: i64 = 1;
pub const OTHER_COMPANY: i64 = 2;
pub const TECHNICIAN: i64 = 42;
pub const TECHNICIAN_PIN: &str = "1234";
const JWT_SECRET: &str = "integration-test-secret";

pub fn jwt_keys() -> JwtKeys {
    JwtKeys::from_secret(JWT_SECRET)
}

/// Rendering engine that answers instantly with a tiny PDF.
#[derive(Default)]
pub struct FakeEngine {
    pub renders: AtomicUsize,
    pub delay: Option<Duration>,
}

#[async_trait]
impl RenderingEngine for FakeEngine {
    async fn render(&self, html: &str, _options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("%PDF-1.4 fake ({} bytes of html)", html.len()).into_bytes())
    }
}

pub struct TestContext {
    pub store: Arc<MemoryReportStore>,
    pub engine: Arc<FakeEngine>,
    pub state: web::Data<AppState>,
    pub keys: web::Data<JwtKeys>,
}

pub fn test_context() -> TestContext {
    test_context_with(FakeEngine::default())
}

pub fn test_context_with(engine: FakeEngine) -> TestContext {
    let store = Arc::new(MemoryReportStore::new());
    store.set_pin(TECHNICIAN, COMPANY, TECHNICIAN_PIN);
    let engine = Arc::new(engine);
    let state = AppState::new_with_parts(
        store.clone(),
        engine.clone(),
        &PdfConfig::default(),
        Duration::from_secs(3600),
        None,
    )
    .expect("Failed to create AppState");
    TestContext {
        store,
        engine,
        state: web::Data::new(state),
        keys: web::Data::new(jwt_keys()),
    }
}

pub fn report(id: i64, company_id: i64, status: InspectionStatus) -> ReportDetails {
    ReportDetails {
        report: ReportRecord {
            id,
            inspection_id: id + 100,
            qr_token: format!("qr-token-{:04}", id),
            unsigned_pdf: None,
            signed_pdf: None,
            is_signed: false,
            signed_at: None,
            signed_by: None,
            sent_at: None,
            created_at: Utc::now(),
        },
        company_id,
        company_name: "Acme Muayene".to_string(),
        inspection_status: status,
        inspection_date: NaiveDate::from_ymd_opt(2026, 3, 9),
        start_time: Some("09:00".to_string()),
        end_time: Some("10:30".to_string()),
        inspection_data: json!({ "brake": "OK", "notes": "Sorun yok" }),
        photo_urls: vec!["/uploads/brake_front.jpg".to_string()],
        technician_id: TECHNICIAN,
        technician_name: "Ayşe".to_string(),
        technician_surname: "Yılmaz".to_string(),
        equipment_name: "Forklift".to_string(),
        equipment_type: "Kaldırma".to_string(),
        template: json!({ "sections": [
            { "type": "checklist", "title": "Frenler",
              "questions": [{ "name": "brake", "label": "Fren", "passValues": ["OK"] }] },
            { "type": "notes", "title": "Notlar", "field": "notes" }
        ]}),
        work_order_number: "WO-7".to_string(),
        customer_name: "Müşteri A.Ş.".to_string(),
        customer_email: Some("musteri@example.com".to_string()),
    }
}

pub fn bearer(company_id: i64, user_id: i64, permissions: &[Permission]) -> String {
    let ctx = AuthContext::new(company_id, user_id, permissions);
    let token = jwt_keys().issue(&ctx).expect("Failed to generate token");
    format!("Bearer {}", token)
}

pub fn full_access() -> String {
    bearer(
        COMPANY,
        TECHNICIAN,
        &[
            Permission::ViewReports,
            Permission::DownloadReports,
            Permission::SignReports,
            Permission::SendReports,
            Permission::SaveInspection,
        ],
    )
}

pub fn outsider() -> String {
    bearer(
        OTHER_COMPANY,
        99,
        &[
            Permission::ViewReports,
            Permission::DownloadReports,
            Permission::SignReports,
            Permission::SendReports,
        ],
    )
}
