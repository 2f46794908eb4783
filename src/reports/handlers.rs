use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use super::model::{
    DownloadQuery, PublicReportView, ReportView, SendReceipt, SignRequest, SigningData,
};
use crate::auth::{require_permission, Permission};
use crate::db::DbId;
use crate::error::ReportError;
use crate::jobs::{JobAccepted, JobStatusView};
use crate::{ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    tag = "Reports",
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report with inspection context", body = ReportView),
        (status = 401, description = "Missing or invalid token", body = crate::ErrorResponse),
        (status = 404, description = "Report not found", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::ViewReports)?;
    let report = state.lifecycle.view(&ctx, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}/download",
    tag = "Reports",
    params(
        ("id" = i64, Path, description = "Report id"),
        ("signed" = Option<bool>, Query, description = "Prefer the signed artifact")
    ),
    responses(
        (status = 200, description = "PDF file", content_type = "application/pdf"),
        (status = 404, description = "Report or PDF not found", body = crate::ErrorResponse),
        (status = 500, description = "PDF generation failed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
    query: web::Query<DownloadQuery>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::DownloadReports)?;
    let id = id.into_inner();
    log::info!("Download of report {} requested (signed={})", id, query.wants_signed());

    let download = state
        .lifecycle
        .download(&ctx, id, query.wants_signed())
        .await?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(download.content_disposition())
        .body(download.bytes))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}/signing-data",
    tag = "Reports",
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 200, description = "Unsigned PDF as base64", body = SigningData),
        (status = 403, description = "Report belongs to another company", body = crate::ErrorResponse),
        (status = 404, description = "Report or unsigned PDF not found", body = crate::ErrorResponse),
        (status = 409, description = "Inspection not completed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_signing_data(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::SignReports)?;
    let data = state
        .lifecycle
        .fetch_signing_payload(&ctx, id.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(data)))
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/sign",
    tag = "Reports",
    params(("id" = i64, Path, description = "Report id")),
    request_body = SignRequest,
    responses(
        (status = 200, description = "Report signed", body = ReportView),
        (status = 400, description = "Invalid PIN format or PDF", body = crate::ErrorResponse),
        (status = 401, description = "Wrong e-signature PIN", body = crate::ErrorResponse),
        (status = 403, description = "Report belongs to another company", body = crate::ErrorResponse),
        (status = 409, description = "Already signed or inspection not completed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn sign_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
    body: web::Json<SignRequest>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::SignReports)?;
    let report = state.lifecycle.sign(&ctx, id.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        report,
        "Rapor başarıyla imzalandı",
    )))
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/send",
    tag = "Reports",
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report queued for delivery", body = SendReceipt),
        (status = 404, description = "Report not found", body = crate::ErrorResponse),
        (status = 409, description = "Report not signed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::SendReports)?;
    let receipt = state.lifecycle.send(&ctx, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        receipt,
        "Rapor başarıyla gönderildi",
    )))
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/prepare",
    tag = "Reports",
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 200, description = "Unsigned PDF generated", body = JobAccepted),
        (status = 409, description = "Inspection not completed", body = crate::ErrorResponse),
        (status = 500, description = "PDF generation failed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn prepare_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::DownloadReports)?;
    let id = id.into_inner();
    log::info!("Synchronous prepare of report {}", id);
    state.lifecycle.prepare(&ctx, id).await?;
    let job = state.jobs.record_completed(ctx.company_id, id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(JobAccepted::from(&job))))
}

#[utoipa::path(
    post,
    path = "/api/reports/{id}/prepare-async",
    tag = "Reports",
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 202, description = "Preparation job accepted", body = JobAccepted)
    ),
    security(("bearer_auth" = []))
)]
pub async fn prepare_report_async(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<DbId>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::DownloadReports)?;
    let id = id.into_inner();
    let lifecycle = state.lifecycle.clone();
    let job_ctx = ctx.clone();
    let job = state.jobs.submit(ctx.company_id, id, move || async move {
        lifecycle.prepare_pooled(&job_ctx, id).await
    });
    Ok(HttpResponse::Accepted().json(ApiResponse::ok(JobAccepted::from(&job))))
}

#[utoipa::path(
    get,
    path = "/api/reports/jobs/{job_id}",
    tag = "Reports",
    params(("job_id" = Uuid, Path, description = "Job id from prepare-async")),
    responses(
        (status = 200, description = "Job status", body = JobStatusView),
        (status = 404, description = "Unknown or expired job", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_job_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    job_id: web::Path<Uuid>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::ViewReports)?;
    let job = state
        .jobs
        .status(ctx.company_id, job_id.into_inner())
        .ok_or_else(|| ReportError::not_found("İş bulunamadı"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(JobStatusView::from(&job))))
}

#[utoipa::path(
    get,
    path = "/api/reports/public/{qr_token}",
    tag = "Reports",
    params(("qr_token" = String, Path, description = "Token printed on the report")),
    responses(
        (status = 200, description = "Signed report, without PDF data", body = PublicReportView),
        (status = 404, description = "Unknown token or report not signed", body = crate::ErrorResponse)
    )
)]
pub async fn get_public_report(
    state: web::Data<AppState>,
    qr_token: web::Path<String>,
) -> Result<HttpResponse, ReportError> {
    let view = state
        .lifecycle
        .gateway()
        .get_by_token(&qr_token.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(view)))
}

#[utoipa::path(
    post,
    path = "/api/inspections/{inspection_id}/report",
    tag = "Reports",
    params(("inspection_id" = i64, Path, description = "Completed inspection id")),
    responses(
        (status = 201, description = "Report created or already present", body = ReportView),
        (status = 404, description = "Inspection not found", body = crate::ErrorResponse),
        (status = 409, description = "Inspection not completed", body = crate::ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn open_report(
    req: HttpRequest,
    state: web::Data<AppState>,
    inspection_id: web::Path<DbId>,
) -> Result<HttpResponse, ReportError> {
    let ctx = require_permission(&req, Permission::SaveInspection)?;
    let report = state
        .lifecycle
        .open_report(&ctx, inspection_id.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(report)))
}

/// Literal segments (`public`, `jobs`) are registered before `{id}`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/reports/public/{qr_token}").route(web::get().to(get_public_report)),
    )
    .service(web::resource("/reports/jobs/{job_id}").route(web::get().to(get_job_status)))
    .service(web::resource("/reports/{id}").route(web::get().to(get_report)))
    .service(web::resource("/reports/{id}/download").route(web::get().to(download_report)))
    .service(
        web::resource("/reports/{id}/signing-data").route(web::get().to(get_signing_data)),
    )
    .service(web::resource("/reports/{id}/sign").route(web::post().to(sign_report)))
    .service(web::resource("/reports/{id}/send").route(web::post().to(send_report)))
    .service(web::resource("/reports/{id}/prepare").route(web::post().to(prepare_report)))
    .service(
        web::resource("/reports/{id}/prepare-async").route(web::post().to(prepare_report_async)),
    )
    .service(
        web::resource("/inspections/{inspection_id}/report").route(web::post().to(open_report)),
    );
}
