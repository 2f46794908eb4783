//! Unauthenticated QR verification lookups.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::model::PublicReportView;
use super::store::ReportStore;
use crate::error::ReportError;

const NOT_FOUND_MESSAGE: &str = "Rapor bulunamadı veya henüz imzalanmamış";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{8,128}$").expect("valid regex"));

pub struct VerificationGateway {
    store: Arc<dyn ReportStore>,
}

impl VerificationGateway {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Redacted view of a signed report.
    ///
    /// Malformed tokens, unknown tokens and unsigned reports all yield the
    /// same `NotFound`.
    pub async fn get_by_token(&self, token: &str) -> Result<PublicReportView, ReportError> {
        if !TOKEN_RE.is_match(token) {
            return Err(ReportError::not_found(NOT_FOUND_MESSAGE));
        }
        match self.store.find_signed_by_token(token).await? {
            Some(details) if details.report.is_signed => Ok(PublicReportView::from(&details)),
            _ => Err(ReportError::not_found(NOT_FOUND_MESSAGE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pattern() {
        assert!(TOKEN_RE.is_match("0f3c9a1e5b7d4c2a"));
        assert!(!TOKEN_RE.is_match("short"));
        assert!(!TOKEN_RE.is_match("../../etc/passwd"));
        assert!(!TOKEN_RE.is_match("abc' OR '1'='1"));
    }
}
