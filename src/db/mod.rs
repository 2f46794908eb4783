//! Database module - AppState and the Postgres report store
//!
//! - `report` - report rows joined with their inspection context

mod report;

pub use report::PgReportStore;

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{AppConfig, PdfConfig};
use crate::jobs::JobTracker;
use crate::pdf::{ChromiumEngine, PdfGenerator, RenderingEngine};
use crate::reports::delivery::{start_delivery_worker, DeliveryNotice};
use crate::reports::{ReportLifecycle, ReportStore};

/// Surrogate key type shared by every table this crate reads.
pub type DbId = i64;

const DELIVERY_QUEUE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored artifact of report {0} is not valid base64")]
    CorruptArtifact(DbId),
    #[error("inspection {0} does not exist")]
    MissingInspection(DbId),
}

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: ReportLifecycle,
    pub jobs: JobTracker,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn new_with_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(100)
            .min_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .idle_timeout(std::time::Duration::from_secs(900))
            .max_lifetime(std::time::Duration::from_secs(1800))
            .connect(&config.database_url)
            .await?;

        Self::new_with_pool(pool, config)
    }

    pub fn new_with_pool(
        pool: PgPool,
        config: &AppConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn ReportStore> = Arc::new(PgReportStore::new(pool));
        let engine: Arc<dyn RenderingEngine> = Arc::new(ChromiumEngine::new(&config.pdf));
        Self::new_with_parts(
            store,
            engine,
            &config.pdf,
            config.job_retention,
            config.notify_webhook_url.clone(),
        )
    }

    /// Assemble the state from explicit collaborators. Spawns the delivery worker.
    pub fn new_with_parts(
        store: Arc<dyn ReportStore>,
        engine: Arc<dyn RenderingEngine>,
        pdf: &PdfConfig,
        job_retention: Duration,
        notify_webhook_url: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(std::time::Duration::from_secs(900))
            .user_agent("inspection-report-server/0.3")
            .build()?;

        let generator = PdfGenerator::new(engine, pdf.max_concurrency, pdf.timeout);

        // Create channel for report delivery worker
        let (delivery_sender, receiver) = mpsc::channel::<DeliveryNotice>(DELIVERY_QUEUE_SIZE);

        // Spawn background delivery worker
        let client = http_client.clone();
        tokio::spawn(async move {
            start_delivery_worker(receiver, client, notify_webhook_url).await;
        });

        Ok(AppState {
            lifecycle: ReportLifecycle::new(store, generator, delivery_sender),
            jobs: JobTracker::new(job_retention),
            http_client,
        })
    }

    pub async fn shutdown(&self) {
        self.lifecycle.pdf().shutdown().await;
    }
}
