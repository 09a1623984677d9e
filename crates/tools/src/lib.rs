//! Side-effect tools for AlterEgo.
//!
//! Both tools acknowledge with `{"recorded": "ok"}` and notify the persona's
//! owner as a side effect:
//! - `record_user_details` — a visitor left an email address
//! - `record_unknown_question` — the persona could not answer something

pub mod notification;
pub mod record_unknown_question;
pub mod record_user_details;

use alterego_core::error::ToolError;
use alterego_core::tool::{ToolArguments, ToolRegistry};
use serde::de::DeserializeOwned;

pub use notification::{LogNotifier, NotificationSink};
pub use record_unknown_question::RecordUnknownQuestionTool;
pub use record_user_details::RecordUserDetailsTool;

/// Create the registry of built-in tools, all notifying through `sink`.
pub fn default_registry(sink: NotificationSink) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RecordUserDetailsTool::new(sink.clone())));
    registry.register(Box::new(RecordUnknownQuestionTool::new(sink)));
    registry
}

/// Deserialize a tool's typed arguments.
fn parse_arguments<T: DeserializeOwned>(tool_name: &str, arguments: ToolArguments) -> Result<T, ToolError> {
    serde_json::from_value(serde_json::Value::Object(arguments))
        .map_err(|e| ToolError::InvalidArguments(format!("{tool_name}: {e}")))
}

/// The fixed acknowledgment both tools return.
fn recorded_ok() -> serde_json::Value {
    serde_json::json!({ "recorded": "ok" })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use async_trait::async_trait;
    use alterego_core::error::NotifyError;
    use alterego_core::event::EventBus;
    use alterego_core::notify::Notifier;
    use crate::notification::NotificationSink;

    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(&self, message: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    pub fn recording_sink() -> (NotificationSink, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = NotificationSink::new(notifier.clone(), Arc::new(EventBus::default()));
        (sink, notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_tools_in_order() {
        let (sink, _) = testing::recording_sink();
        let registry = default_registry(sink);
        assert_eq!(
            registry.names(),
            vec!["record_user_details", "record_unknown_question"]
        );
        let defs = registry.definitions();
        assert!(defs.iter().all(|d| d.parameters["type"] == "object"));
    }
}
