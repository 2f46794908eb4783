//! Owned handle over the shared rendering engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::{PdfError, PdfOptions, RenderingEngine};

/// Converts report HTML to PDF bytes.
///
/// `render_direct` runs immediately on the caller's task. `render_pooled`
/// waits for one of a fixed number of engine slots first, which keeps a burst
/// of background jobs from opening dozens of browser contexts at once.
/// Both paths share the same engine and enforce the same wall-clock timeout.
#[derive(Clone)]
pub struct PdfGenerator {
    engine: Arc<dyn RenderingEngine>,
    options: PdfOptions,
    slots: Arc<Semaphore>,
    timeout: Duration,
}

impl PdfGenerator {
    pub fn new(engine: Arc<dyn RenderingEngine>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            engine,
            options: PdfOptions::default(),
            slots: Arc::new(Semaphore::new(max_concurrency.max(1))),
            timeout,
        }
    }

    pub fn options(&self) -> &PdfOptions {
        &self.options
    }

    /// Convert synchronously from the caller's point of view.
    pub async fn render_direct(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        if self.slots.is_closed() {
            return Err(PdfError::ShutDown);
        }
        self.render_with_timeout(html).await
    }

    /// Convert once an engine slot is free.
    pub async fn render_pooled(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| PdfError::ShutDown)?;
        self.render_with_timeout(html).await
    }

    async fn render_with_timeout(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(self.timeout, self.engine.render(html, &self.options))
            .await
            .unwrap_or(Err(PdfError::Timeout(self.timeout)));
        match &result {
            Ok(pdf) => log::debug!(
                "Rendered PDF ({} bytes) in {} ms",
                pdf.len(),
                started.elapsed().as_millis()
            ),
            Err(e) => log::error!("PDF rendering failed: {}", e),
        }
        result
    }

    /// Stop accepting work and release the engine.
    pub async fn shutdown(&self) {
        self.slots.close();
        self.engine.shutdown().await;
        log::info!("PDF generator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SlowEngine {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RenderingEngine for SlowEngine {
        async fn render(&self, html: &str, _options: &PdfOptions) -> Result<Vec<u8>, PdfError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("%PDF-1.4 {}", html).into_bytes())
        }
    }

    fn slow(delay_ms: u64) -> Arc<SlowEngine> {
        Arc::new(SlowEngine {
            delay: Duration::from_millis(delay_ms),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_render_direct_returns_engine_bytes() {
        let generator = PdfGenerator::new(slow(1), 2, Duration::from_secs(5));
        let pdf = generator.render_direct("<p>a</p>").await.unwrap();
        assert_eq!(pdf, b"%PDF-1.4 <p>a</p>");
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let generator = PdfGenerator::new(slow(500), 1, Duration::from_millis(20));
        let result = generator.render_direct("x").await;
        assert!(matches!(result, Err(PdfError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_pooled_respects_concurrency_limit() {
        let engine = slow(30);
        let generator = PdfGenerator::new(engine.clone(), 2, Duration::from_secs(5));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let generator = generator.clone();
                tokio::spawn(async move { generator.render_pooled(&format!("doc-{}", i)).await })
            })
            .collect();
        for (i, task) in tasks.into_iter().enumerate() {
            let pdf = task.await.unwrap().unwrap();
            assert_eq!(pdf, format!("%PDF-1.4 doc-{}", i).into_bytes());
        }
        assert!(engine.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let generator = PdfGenerator::new(slow(1), 1, Duration::from_secs(1));
        generator.shutdown().await;
        assert!(matches!(generator.render_pooled("x").await, Err(PdfError::ShutDown)));
        assert!(matches!(generator.render_direct("x").await, Err(PdfError::ShutDown)));
    }
}
