mod common;

use actix_web::{http::StatusCode, test, App};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use common::*;
use inspection_report_server::auth::Permission;
use inspection_report_server::reports::model::InspectionStatus;
use inspection_report_server::{configure_api, json_config};

const SIGNED_PDF: &[u8] = b"%PDF-1.7 signed externally";

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.state.clone())
                .app_data($ctx.keys.clone())
                .app_data(json_config())
                .configure(configure_api),
        )
        .await
    };
}

fn sign_body(pin: &str) -> Value {
    json!({ "pin": pin, "signedPdfBase64": STANDARD.encode(SIGNED_PDF) })
}

#[actix_web::test]
async fn test_health() {
    let ctx = test_context();
    let app = app!(ctx);
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn test_requests_without_token_are_unauthorized() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/reports/1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn test_missing_capability_is_forbidden() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/send")
        .insert_header(("Authorization", bearer(COMPANY, TECHNICIAN, &[Permission::ViewReports])))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_get_report_omits_artifact_bytes() {
    let ctx = test_context();
    let mut details = report(1, COMPANY, InspectionStatus::Completed);
    details.report.unsigned_pdf = Some(b"%PDF-1.4 cached".to_vec());
    ctx.store.insert(details);
    let app = app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/reports/1")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let data = &body["data"];
    assert_eq!(data["hasUnsignedPdf"], true);
    assert_eq!(data["hasSignedPdf"], false);
    assert_eq!(data["equipmentName"], "Forklift");
    assert!(data.get("unsignedPdf").is_none());
}

#[actix_web::test]
async fn test_other_company_sees_not_found() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    for uri in ["/api/reports/1", "/api/reports/1/download"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(("Authorization", outsider()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
    }

    let req = test::TestRequest::get()
        .uri("/api/reports/1/signing-data")
        .insert_header(("Authorization", outsider()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_prepare_then_sign_then_download_signed() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/prepare")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["jobId"].is_string());

    let req = test::TestRequest::get()
        .uri("/api/reports/1/signing-data")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let unsigned = STANDARD
        .decode(body["data"]["pdfBase64"].as_str().unwrap())
        .unwrap();
    assert!(unsigned.starts_with(b"%PDF-1.4 fake"));

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .set_json(sign_body(TECHNICIAN_PIN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["isSigned"], true);
    assert_eq!(body["message"], "Rapor başarıyla imzalandı");

    let req = test::TestRequest::get()
        .uri("/api/reports/1/download?signed=true")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("Content-Type").unwrap().to_str().unwrap(),
        "application/pdf"
    );
    let disposition = resp
        .headers()
        .get("Content-Disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Forklift_WO-7_2026-03-09.pdf\""));
    assert!(disposition.contains("filename*=UTF-8''Forklift_WO-7_2026-03-09.pdf"));
    let bytes = test::read_body(resp).await;
    assert_eq!(bytes.as_ref(), SIGNED_PDF);

    let req = test::TestRequest::get()
        .uri("/api/reports/1/download")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let bytes = test::call_and_read_body(&app, req).await;
    assert_eq!(bytes.as_ref(), unsigned.as_slice());
}

#[actix_web::test]
async fn test_wrong_pin_then_right_pin() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .set_json(sign_body("0000"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(!ctx.store.get(1).unwrap().report.is_signed);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .set_json(sign_body("1234"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .set_json(sign_body("1234"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[actix_web::test]
async fn test_sign_validation_envelope() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .set_json(json!({ "pin": "12" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn test_prepare_pending_inspection_conflicts() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Pending));
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/prepare")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_send_signed_report() {
    let ctx = test_context();
    ctx.store.insert(report(1, COMPANY, InspectionStatus::Completed));
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/send")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/reports/1/sign")
        .insert_header(("Authorization", full_access()))
        .set_json(sign_body(TECHNICIAN_PIN))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/reports/1/send")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body["data"],
        json!({
            "customerEmail": "musteri@example.com",
            "customerName": "Müşteri A.Ş.",
            "equipmentName": "Forklift",
            "workOrderNumber": "WO-7"
        })
    );
    assert!(ctx.store.get(1).unwrap().report.sent_at.is_some());
}

#[actix_web::test]
async fn test_open_report_for_completed_inspection() {
    let ctx = test_context();
    let mut inspection = report(0, COMPANY, InspectionStatus::Completed);
    inspection.report.inspection_id = 900;
    ctx.store.insert_inspection(inspection);
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/inspections/900/report")
        .insert_header(("Authorization", full_access()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["inspectionId"], 900);
    assert_eq!(body["data"]["isSigned"], false);
}
