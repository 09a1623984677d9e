//! Fire-and-forget delivery of owner notifications.
//!
//! Tools never fail because a notification could not be sent. Failures are
//! logged and published as `DomainEvent::NotificationFailed` so a broken
//! channel is still visible to operators.

use std::sync::Arc;
use async_trait::async_trait;
use alterego_core::error::NotifyError;
use alterego_core::event::{DomainEvent, EventBus};
use alterego_core::notify::Notifier;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Shared handle the tools use to notify the persona's owner.
#[derive(Clone)]
pub struct NotificationSink {
    notifier: Option<Arc<dyn Notifier>>,
    events: Arc<EventBus>,
}

impl NotificationSink {
    pub fn new(notifier: Arc<dyn Notifier>, events: Arc<EventBus>) -> Self {
        Self {
            notifier: Some(notifier),
            events,
        }
    }

    /// A sink that drops every notification.
    pub fn disabled(events: Arc<EventBus>) -> Self {
        Self {
            notifier: None,
            events,
        }
    }

    /// Deliver `text`, swallowing any failure.
    pub async fn fire(&self, text: &str) {
        let Some(notifier) = &self.notifier else {
            debug!("Notifications disabled, dropping message");
            return;
        };

        match notifier.notify(text).await {
            Ok(()) => debug!(notifier = notifier.name(), "Notification delivered"),
            Err(e) => {
                warn!(notifier = notifier.name(), error = %e, "Notification delivery failed");
                self.events.publish(DomainEvent::NotificationFailed {
                    notifier: notifier.name().to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

/// Writes notifications to the log instead of a push service.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!(target: "alterego::notification", "{message}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify(&self, message: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct BrokenNotifier;

    #[async_trait]
    impl Notifier for BrokenNotifier {
        fn name(&self) -> &str {
            "broken"
        }

        async fn notify(&self, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::DeliveryFailed("503 Service Unavailable".into()))
        }
    }

    #[tokio::test]
    async fn delivers_through_notifier() {
        let notifier = Arc::new(CountingNotifier { sent: Mutex::new(vec![]) });
        let sink = NotificationSink::new(notifier.clone(), Arc::new(EventBus::default()));

        sink.fire("Recording hello").await;
        assert_eq!(*notifier.sent.lock().unwrap(), vec!["Recording hello"]);
    }

    #[tokio::test]
    async fn failure_is_swallowed_and_published() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let sink = NotificationSink::new(Arc::new(BrokenNotifier), events);

        sink.fire("Recording hello").await;

        let event = rx.try_recv().unwrap();
        match event.as_ref() {
            DomainEvent::NotificationFailed { notifier, error_message, .. } => {
                assert_eq!(notifier, "broken");
                assert!(error_message.contains("503"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_sink_publishes_nothing() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        NotificationSink::disabled(events).fire("ignored").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("anything").await.is_ok());
    }
}
