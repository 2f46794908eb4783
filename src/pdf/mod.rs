//! PDF materialization.
//!
//! The headless browser is reached through the [`RenderingEngine`] trait so the
//! report lifecycle can run against a fake engine in tests:
//! - `engine` - one long-lived headless Chromium, an isolated context per conversion
//! - `devtools` - websocket command/event channel to the browser
//! - `generator` - owned engine handle with direct and pooled entry points

pub mod devtools;
pub mod engine;
pub mod generator;

pub use engine::ChromiumEngine;
pub use generator::PdfGenerator;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while turning HTML into PDF bytes. All are retryable.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to launch rendering engine: {0}")]
    Launch(#[source] std::io::Error),
    #[error("failed to prepare conversion workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("rendering engine exited with status {code}")]
    EngineExit { code: i32, stderr: String },
    #[error("rendering engine protocol error: {0}")]
    Protocol(String),
    #[error("rendering engine timed out after {0:?}")]
    Timeout(Duration),
    #[error("rendering engine produced no PDF output")]
    MissingOutput,
    #[error("rendering engine output is not a PDF document")]
    InvalidOutput,
    #[error("rendering engine is shut down")]
    ShutDown,
}

/// Page setup applied to every conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub page_size: &'static str,
    pub margin_mm: u32,
    pub print_background: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page_size: "A4",
            margin_mm: 12,
            print_background: true,
        }
    }
}

impl PdfOptions {
    /// Print stylesheet that pins page size, margins and background printing.
    pub fn print_css(&self) -> String {
        let background = if self.print_background {
            "* { -webkit-print-color-adjust: exact; print-color-adjust: exact; }"
        } else {
            ""
        };
        format!(
            "@page {{ size: {}; margin: {}mm; }} {}",
            self.page_size, self.margin_mm, background
        )
    }
}

/// An external engine that prints HTML to PDF.
///
/// Implementations must run every call in its own context so concurrent
/// conversions cannot see each other's content.
#[async_trait]
pub trait RenderingEngine: Send + Sync {
    async fn render(&self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, PdfError>;

    /// Release any long-lived engine resources.
    async fn shutdown(&self) {}
}

/// Cheap sanity check on engine output.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_a4_with_12mm_margins() {
        let options = PdfOptions::default();
        let css = options.print_css();
        assert!(css.contains("size: A4"));
        assert!(css.contains("margin: 12mm"));
        assert!(css.contains("print-color-adjust: exact"));
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"<html>"));
        assert!(!looks_like_pdf(b""));
    }
}
