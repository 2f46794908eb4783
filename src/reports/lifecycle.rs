//! Report state machine: prepare, sign, download and send.
//!
//! Every operation takes the caller's `AuthContext`. View, download and send
//! treat another company's report as missing; signing answers with
//! `Forbidden` instead, after the PIN has been checked.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::delivery::DeliveryNotice;
use super::gateway::VerificationGateway;
use super::model::{
    encode_pdf, InspectionStatus, PdfDownload, ReportDetails, ReportView, SendReceipt,
    SignRequest, SigningData,
};
use super::store::ReportStore;
use crate::auth::model::AuthContext;
use crate::auth::pin::verify_pin;
use crate::db::DbId;
use crate::error::ReportError;
use crate::pdf::PdfGenerator;

const REPORT_NOT_FOUND: &str = "Rapor bulunamadı";

#[derive(Clone)]
pub struct ReportLifecycle {
    store: Arc<dyn ReportStore>,
    pdf: PdfGenerator,
    delivery: mpsc::Sender<DeliveryNotice>,
}

#[derive(Clone, Copy)]
enum RenderPath {
    Direct,
    Pooled,
}

impl ReportLifecycle {
    pub fn new(
        store: Arc<dyn ReportStore>,
        pdf: PdfGenerator,
        delivery: mpsc::Sender<DeliveryNotice>,
    ) -> Self {
        Self {
            store,
            pdf,
            delivery,
        }
    }

    pub fn pdf(&self) -> &PdfGenerator {
        &self.pdf
    }

    pub fn gateway(&self) -> VerificationGateway {
        VerificationGateway::new(self.store.clone())
    }

    /// Report of the caller's company, or `NotFound`.
    async fn load_scoped(&self, ctx: &AuthContext, id: DbId) -> Result<ReportDetails, ReportError> {
        match self.store.find_details(id).await? {
            Some(details) if details.company_id == ctx.company_id => Ok(details),
            Some(_) => {
                log::warn!(
                    "Company {} requested report {} of another company",
                    ctx.company_id,
                    id
                );
                Err(ReportError::not_found(REPORT_NOT_FOUND))
            }
            None => Err(ReportError::not_found(REPORT_NOT_FOUND)),
        }
    }

    pub async fn view(&self, ctx: &AuthContext, id: DbId) -> Result<ReportView, ReportError> {
        let details = self.load_scoped(ctx, id).await?;
        Ok(ReportView::from(&details))
    }

    /// Render the unsigned artifact and cache it. Waits for the result.
    pub async fn prepare(&self, ctx: &AuthContext, id: DbId) -> Result<(), ReportError> {
        let details = self.load_scoped(ctx, id).await?;
        self.render_and_cache(&details, RenderPath::Direct).await?;
        Ok(())
    }

    /// Same as `prepare`, but waits for a pooled engine slot. Used by background jobs.
    pub async fn prepare_pooled(&self, ctx: &AuthContext, id: DbId) -> Result<(), ReportError> {
        let details = self.load_scoped(ctx, id).await?;
        self.render_and_cache(&details, RenderPath::Pooled).await?;
        Ok(())
    }

    async fn render_and_cache(
        &self,
        details: &ReportDetails,
        path: RenderPath,
    ) -> Result<Vec<u8>, ReportError> {
        if !details.is_completed() {
            return Err(ReportError::InvalidState(
                "Sadece tamamlanmış muayenelerin raporları oluşturulabilir".to_string(),
            ));
        }
        let html = details.to_document().to_html(Utc::now().date_naive());
        let pdf = match path {
            RenderPath::Direct => self.pdf.render_direct(&html).await?,
            RenderPath::Pooled => self.pdf.render_pooled(&html).await?,
        };
        self.store.store_unsigned(details.report.id, &pdf).await?;
        log::info!(
            "Cached unsigned PDF for report {} ({} bytes)",
            details.report.id,
            pdf.len()
        );
        Ok(pdf)
    }

    pub async fn fetch_signing_payload(
        &self,
        ctx: &AuthContext,
        id: DbId,
    ) -> Result<SigningData, ReportError> {
        let details = self
            .store
            .find_details(id)
            .await?
            .ok_or_else(|| ReportError::not_found(REPORT_NOT_FOUND))?;
        if details.company_id != ctx.company_id {
            return Err(ReportError::Forbidden(
                "Bu rapora erişim yetkiniz yok".to_string(),
            ));
        }
        if !details.is_completed() {
            return Err(ReportError::conflict(
                "Sadece tamamlanmış muayenelerin raporları imzalanabilir",
            ));
        }
        let pdf = details
            .report
            .unsigned_pdf
            .as_deref()
            .ok_or_else(|| ReportError::not_found("İmzalanacak PDF bulunamadı"))?;
        Ok(SigningData {
            pdf_base64: encode_pdf(pdf),
        })
    }

    /// One-shot signing.
    ///
    /// Checks run in a fixed order: input, PIN, existence, tenant, inspection
    /// state, signed flag. The final write is conditional on the report still
    /// being unsigned, so two racing requests cannot both succeed.
    pub async fn sign(
        &self,
        ctx: &AuthContext,
        id: DbId,
        request: &SignRequest,
    ) -> Result<ReportView, ReportError> {
        let request = request.validate()?;

        let stored_pin = self.store.technician_pin(ctx.user_id, ctx.company_id).await?;
        let pin_ok = stored_pin
            .as_deref()
            .map(|stored| verify_pin(stored, &request.pin))
            .unwrap_or(false);
        if !pin_ok {
            log::warn!("Rejected e-signature PIN for user {}", ctx.user_id);
            return Err(ReportError::Unauthorized(
                "Geçersiz e-imza PIN'i".to_string(),
            ));
        }

        let details = self
            .store
            .find_details(id)
            .await?
            .ok_or_else(|| ReportError::not_found(REPORT_NOT_FOUND))?;
        if details.company_id != ctx.company_id {
            return Err(ReportError::Forbidden(
                "Bu rapora erişim yetkiniz yok".to_string(),
            ));
        }
        if !details.is_completed() {
            return Err(ReportError::conflict(
                "Sadece tamamlanmış muayenelerin raporları imzalanabilir",
            ));
        }
        if details.report.is_signed {
            return Err(ReportError::conflict("Rapor zaten imzalanmış"));
        }

        if !self
            .store
            .mark_signed(id, &request.signed_pdf, ctx.user_id)
            .await?
        {
            return Err(ReportError::conflict("Rapor zaten imzalanmış"));
        }
        log::info!("Report {} signed by user {}", id, ctx.user_id);

        let signed = self
            .store
            .find_details(id)
            .await?
            .ok_or_else(|| ReportError::not_found(REPORT_NOT_FOUND))?;
        Ok(ReportView::from(&signed))
    }

    /// Signed bytes when asked for and available, else the unsigned cache,
    /// rendering it first if needed.
    pub async fn download(
        &self,
        ctx: &AuthContext,
        id: DbId,
        want_signed: bool,
    ) -> Result<PdfDownload, ReportError> {
        let details = self.load_scoped(ctx, id).await?;
        let filename = download_filename(&details);

        if want_signed && details.report.is_signed {
            if let Some(signed) = &details.report.signed_pdf {
                return Ok(PdfDownload {
                    filename,
                    bytes: signed.clone(),
                });
            }
        }
        if let Some(unsigned) = &details.report.unsigned_pdf {
            return Ok(PdfDownload {
                filename,
                bytes: unsigned.clone(),
            });
        }

        let bytes = match self.render_and_cache(&details, RenderPath::Direct).await {
            Ok(bytes) => bytes,
            Err(ReportError::InvalidState(_)) => {
                return Err(ReportError::not_found("PDF rapor bulunamadı"))
            }
            Err(e) => return Err(e),
        };
        Ok(PdfDownload { filename, bytes })
    }

    pub async fn send(&self, ctx: &AuthContext, id: DbId) -> Result<SendReceipt, ReportError> {
        let details = self.load_scoped(ctx, id).await?;
        if !details.report.is_signed {
            return Err(ReportError::conflict(
                "Sadece imzalanmış raporlar gönderilebilir",
            ));
        }
        // Hold a queue slot before committing, so a sent report always has
        // its delivery queued. A full queue waits for the worker.
        let slot = self.delivery.reserve().await.map_err(|_| {
            log::error!("Delivery queue closed, report {} not sent", id);
            ReportError::Internal("delivery worker is not running".to_string())
        })?;
        self.store.mark_sent(id).await?;
        slot.send(DeliveryNotice::from(&details));

        Ok(SendReceipt {
            customer_email: details.customer_email.clone(),
            customer_name: details.customer_name.clone(),
            equipment_name: details.equipment_name.clone(),
            work_order_number: details.work_order_number.clone(),
        })
    }

    /// Create the report for a completed inspection; idempotent.
    pub async fn open_report(
        &self,
        ctx: &AuthContext,
        inspection_id: DbId,
    ) -> Result<ReportView, ReportError> {
        match self
            .store
            .inspection_status(inspection_id, ctx.company_id)
            .await?
        {
            None => return Err(ReportError::not_found("Muayene bulunamadı")),
            Some(InspectionStatus::Pending) => {
                return Err(ReportError::InvalidState(
                    "Sadece tamamlanmış muayeneler için rapor oluşturulabilir".to_string(),
                ))
            }
            Some(InspectionStatus::Completed) => {}
        }
        let record = self
            .store
            .create_for_inspection(inspection_id, &new_qr_token())
            .await?;
        self.view(ctx, record.id).await
    }
}

/// 64 hex characters from two random v4 uuids.
fn new_qr_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn download_filename(details: &ReportDetails) -> String {
    let mut parts = vec![
        details.equipment_name.clone(),
        details.work_order_number.clone(),
    ];
    if let Some(date) = details.inspection_date {
        parts.push(date.format("%Y-%m-%d").to_string());
    }
    let name = sanitize_filename::sanitize(format!("{}.pdf", parts.join("_")));
    name.replace('"', "")
}
