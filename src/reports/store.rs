//! Keyed access to report rows.

use async_trait::async_trait;

use super::model::{InspectionStatus, ReportDetails, ReportRecord};
use crate::db::{DbId, StoreError};

/// Record store behind the report lifecycle.
///
/// Implementations must make `mark_signed` a single conditional write: it
/// succeeds for at most one caller per report and never touches a row that
/// is already signed. `store_unsigned` must never touch the signed fields.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Report joined with inspection, equipment, technician, work order,
    /// customer and company.
    async fn find_details(&self, id: DbId) -> Result<Option<ReportDetails>, StoreError>;

    /// Signed report by QR token. Unsigned reports are not returned.
    async fn find_signed_by_token(&self, token: &str)
        -> Result<Option<ReportDetails>, StoreError>;

    async fn store_unsigned(&self, id: DbId, pdf: &[u8]) -> Result<(), StoreError>;

    /// Returns false when the report was already signed (or no longer exists).
    async fn mark_signed(
        &self,
        id: DbId,
        signed_pdf: &[u8],
        signed_by: DbId,
    ) -> Result<bool, StoreError>;

    async fn mark_sent(&self, id: DbId) -> Result<(), StoreError>;

    /// Stored e-signature credential of a technician within a company.
    async fn technician_pin(
        &self,
        technician_id: DbId,
        company_id: DbId,
    ) -> Result<Option<String>, StoreError>;

    async fn inspection_status(
        &self,
        inspection_id: DbId,
        company_id: DbId,
    ) -> Result<Option<InspectionStatus>, StoreError>;

    /// Insert the report for an inspection, or return the existing one.
    async fn create_for_inspection(
        &self,
        inspection_id: DbId,
        qr_token: &str,
    ) -> Result<ReportRecord, StoreError>;
}
