//! Low-stock notifications.
//!
//! ## Delivery
//! ```text
//! record transaction ──► Recorded { low_stock: true }
//!        │
//!        ▼
//! LowStockNotifier::notify()  ── try_send ──►  bounded mpsc  ──► worker task
//!        │                                                          │
//!        │ channel full → warn!, event dropped                      ▼
//!        ▼                                       webhook_url set?  POST JSON
//! handler returns 201                            otherwise          info! log
//! ```
//!
//! The request path never waits on delivery, and a failed delivery is
//! logged and not retried.

use std::time::Duration;

use chrono::{DateTime, Utc};
use medstore_core::{Item, Transaction, TransactionType};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;

/// Webhook request timeout.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload POSTed to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockEvent {
    pub item_id: String,
    pub item_name: String,
    pub barcode: String,
    pub quantity: i64,
    pub available_quantity: i64,
    pub reorder_level: i64,
    pub transaction_type: TransactionType,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
}

impl LowStockEvent {
    pub fn new(item: &Item, transaction: &Transaction) -> Self {
        LowStockEvent {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            barcode: item.barcode.clone(),
            quantity: item.quantity,
            available_quantity: item.available_quantity,
            reorder_level: item.reorder_level,
            transaction_type: transaction.transaction_type,
            performed_by: transaction.performed_by.clone(),
            timestamp: transaction.timestamp,
        }
    }
}

/// Handle used by handlers to queue events.
#[derive(Debug, Clone)]
pub struct LowStockNotifier {
    sender: mpsc::Sender<LowStockEvent>,
}

impl LowStockNotifier {
    /// Starts the background worker. Must be called inside a Tokio runtime.
    pub fn spawn(config: &NotificationConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        let (notifier, receiver) = Self::channel(config.channel_capacity);
        let worker = Worker {
            client,
            webhook_url: config.webhook_url.clone(),
        };
        tokio::spawn(worker.run(receiver));
        Ok(notifier)
    }

    fn channel(capacity: usize) -> (Self, mpsc::Receiver<LowStockEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (LowStockNotifier { sender }, receiver)
    }

    /// Queues an event. Returns `false` when it was dropped.
    pub fn notify(&self, event: LowStockEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(item_id = %event.item_id, "Notification queue full, dropping low-stock event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(item_id = %event.item_id, "Notification worker stopped, dropping low-stock event");
                false
            }
        }
    }
}

struct Worker {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<LowStockEvent>) {
        debug!(webhook = self.webhook_url.is_some(), "Notification worker started");

        while let Some(event) = receiver.recv().await {
            match self.webhook_url.as_deref() {
                Some(url) => self.deliver(url, &event).await,
                None => info!(
                    item_id = %event.item_id,
                    item = %event.item_name,
                    quantity = event.quantity,
                    reorder_level = event.reorder_level,
                    "Low stock"
                ),
            }
        }

        debug!("Notification worker stopped");
    }

    async fn deliver(&self, url: &str, event: &LowStockEvent) {
        let result = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(response) => debug!(
                item_id = %event.item_id,
                status = %response.status(),
                "Low-stock webhook delivered"
            ),
            Err(e) => warn!(item_id = %event.item_id, error = %e, "Low-stock webhook failed"),
        }
    }
}
