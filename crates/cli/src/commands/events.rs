//! Domain events surfaced as log lines.

use std::sync::Arc;
use alterego_core::event::DomainEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Log every published event until the bus is dropped. Returns how many were logged.
pub async fn log_events(mut rx: broadcast::Receiver<Arc<DomainEvent>>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                logged += 1;
                debug!(event = event.kind(), detail = ?event, "Domain event");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event logger fell behind");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}
