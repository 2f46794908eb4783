//! In-process report store, used by tests and local demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::model::{InspectionStatus, ReportDetails, ReportRecord};
use super::store::ReportStore;
use crate::db::{DbId, StoreError};

#[derive(Default)]
struct Tables {
    reports: HashMap<DbId, ReportDetails>,
    /// Inspections that have no report yet, keyed by inspection id.
    inspections: HashMap<DbId, ReportDetails>,
    pins: HashMap<(DbId, DbId), String>,
}

pub struct MemoryReportStore {
    tables: Mutex<Tables>,
    next_id: AtomicI64,
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_id: AtomicI64::new(1000),
        }
    }

    pub fn insert(&self, details: ReportDetails) {
        self.tables.lock().reports.insert(details.report.id, details);
    }

    /// Register an inspection that a report can later be created for.
    /// The report fields of `details` are ignored.
    pub fn insert_inspection(&self, details: ReportDetails) {
        self.tables
            .lock()
            .inspections
            .insert(details.report.inspection_id, details);
    }

    pub fn set_pin(&self, technician_id: DbId, company_id: DbId, pin: &str) {
        self.tables
            .lock()
            .pins
            .insert((technician_id, company_id), pin.to_string());
    }

    pub fn get(&self, id: DbId) -> Option<ReportDetails> {
        self.tables.lock().reports.get(&id).cloned()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn find_details(&self, id: DbId) -> Result<Option<ReportDetails>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_signed_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ReportDetails>, StoreError> {
        Ok(self
            .tables
            .lock()
            .reports
            .values()
            .find(|d| d.report.qr_token == token && d.report.is_signed)
            .cloned())
    }

    async fn store_unsigned(&self, id: DbId, pdf: &[u8]) -> Result<(), StoreError> {
        if let Some(details) = self.tables.lock().reports.get_mut(&id) {
            details.report.unsigned_pdf = Some(pdf.to_vec());
        }
        Ok(())
    }

    async fn mark_signed(
        &self,
        id: DbId,
        signed_pdf: &[u8],
        signed_by: DbId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        match tables.reports.get_mut(&id) {
            Some(details) if !details.report.is_signed => {
                details.report.signed_pdf = Some(signed_pdf.to_vec());
                details.report.is_signed = true;
                details.report.signed_at = Some(Utc::now());
                details.report.signed_by = Some(signed_by);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_sent(&self, id: DbId) -> Result<(), StoreError> {
        if let Some(details) = self.tables.lock().reports.get_mut(&id) {
            details.report.sent_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn technician_pin(
        &self,
        technician_id: DbId,
        company_id: DbId,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .tables
            .lock()
            .pins
            .get(&(technician_id, company_id))
            .cloned())
    }

    async fn inspection_status(
        &self,
        inspection_id: DbId,
        company_id: DbId,
    ) -> Result<Option<InspectionStatus>, StoreError> {
        let tables = self.tables.lock();
        let pending = tables.inspections.get(&inspection_id);
        let reported = tables
            .reports
            .values()
            .find(|d| d.report.inspection_id == inspection_id);
        Ok(pending
            .or(reported)
            .filter(|d| d.company_id == company_id)
            .map(|d| d.inspection_status))
    }

    async fn create_for_inspection(
        &self,
        inspection_id: DbId,
        qr_token: &str,
    ) -> Result<ReportRecord, StoreError> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables
            .reports
            .values()
            .find(|d| d.report.inspection_id == inspection_id)
        {
            return Ok(existing.report.clone());
        }
        let mut details = tables
            .inspections
            .remove(&inspection_id)
            .ok_or(StoreError::MissingInspection(inspection_id))?;
        details.report = ReportRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            inspection_id,
            qr_token: qr_token.to_string(),
            unsigned_pdf: None,
            signed_pdf: None,
            is_signed: false,
            signed_at: None,
            signed_by: None,
            sent_at: None,
            created_at: Utc::now(),
        };
        let record = details.report.clone();
        tables.reports.insert(record.id, details);
        Ok(record)
    }
}
