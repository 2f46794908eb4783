//! Background delivery worker for sent reports.
//!
//! `send` only records `sent_at` and queues a notice here. The worker posts
//! each notice to a webhook when one is configured, otherwise it logs it.

use serde::Serialize;
use tokio::sync::mpsc;

use super::model::ReportDetails;
use crate::db::DbId;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNotice {
    pub report_id: DbId,
    pub qr_token: String,
    pub customer_email: Option<String>,
    pub customer_name: String,
    pub equipment_name: String,
    pub work_order_number: String,
}

impl From<&ReportDetails> for DeliveryNotice {
    fn from(details: &ReportDetails) -> Self {
        Self {
            report_id: details.report.id,
            qr_token: details.report.qr_token.clone(),
            customer_email: details.customer_email.clone(),
            customer_name: details.customer_name.clone(),
            equipment_name: details.equipment_name.clone(),
            work_order_number: details.work_order_number.clone(),
        }
    }
}

/// Starts the background delivery worker.
///
/// Runs until every sender is dropped.
pub async fn start_delivery_worker(
    mut receiver: mpsc::Receiver<DeliveryNotice>,
    client: reqwest::Client,
    webhook_url: Option<String>,
) {
    log::info!("Report delivery worker started");

    while let Some(notice) = receiver.recv().await {
        match webhook_url.as_deref() {
            Some(url) => deliver_to_webhook(&client, url, &notice).await,
            None => log::info!(
                "Report {} ready for {} (work order {}), no webhook configured",
                notice.report_id,
                notice.customer_name,
                notice.work_order_number
            ),
        }
    }

    log::info!("Report delivery worker stopped");
}

async fn deliver_to_webhook(client: &reqwest::Client, url: &str, notice: &DeliveryNotice) {
    match client.post(url).json(notice).send().await {
        Ok(response) if response.status().is_success() => {
            log::info!("Delivery notice for report {} accepted", notice.report_id);
        }
        Ok(response) => {
            log::error!(
                "Delivery webhook rejected report {} with status {}",
                notice.report_id,
                response.status()
            );
        }
        Err(e) => {
            log::error!(
                "Failed to post delivery notice for report {}: {}",
                notice.report_id,
                e
            );
        }
    }
}
