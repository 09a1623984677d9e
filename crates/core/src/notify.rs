//! Notifier trait — the narrow interface to an outbound push channel.
//!
//! Tools use a notifier to tell the persona's owner that something happened
//! (a visitor left an email, a question went unanswered). The transport
//! behind it is an external concern.

use async_trait::async_trait;
use crate::error::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// A human-readable name for this notifier (e.g., "log", "pushover").
    fn name(&self) -> &str;

    /// Deliver a single text notification.
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}
