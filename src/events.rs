use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the pricing and capacity engine.
///
/// Consumers (webhook fanout, audit trail) subscribe via the processor task;
/// the engine itself only publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RateCreated {
        rate_id: Uuid,
        warehouse_id: Uuid,
        zone_id: Uuid,
        service_tier: String,
    },
    RateUpdated(Uuid),
    RateDeleted(Uuid),
    PackageAssignedToBin {
        assignment_id: Uuid,
        package_id: Uuid,
        bin_location_id: Uuid,
    },
    PackageRemovedFromBin {
        assignment_id: Uuid,
        package_id: Uuid,
        bin_location_id: Uuid,
    },
    StorageChargeRecorded {
        charge_id: Uuid,
        package_id: Uuid,
        charge_from: NaiveDate,
        charge_to: NaiveDate,
    },
    StorageChargesInvoiced {
        invoice_id: Uuid,
        charge_count: usize,
    },
    StoragePolicyCreated(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel with its sender wrapper.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until all senders drop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "engine event");
    }
}
