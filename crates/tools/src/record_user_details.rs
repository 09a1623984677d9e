//! Record a visitor who wants to get in touch.

use async_trait::async_trait;
use alterego_core::error::ToolError;
use alterego_core::tool::{Tool, ToolArguments};
use serde::Deserialize;
use crate::notification::NotificationSink;
use crate::{parse_arguments, recorded_ok};

const NAME_PLACEHOLDER: &str = "Name not provided";
const NOTES_PLACEHOLDER: &str = "not provided";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordUserDetailsArgs {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

pub struct RecordUserDetailsTool {
    sink: NotificationSink,
}

impl RecordUserDetailsTool {
    pub fn new(sink: NotificationSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for RecordUserDetailsTool {
    fn name(&self) -> &str {
        "record_user_details"
    }

    fn description(&self) -> &str {
        "Use this tool to record that a user is interested in being in touch and provided an email address"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "email": {
                    "type": "string",
                    "description": "The email address of this user"
                },
                "name": {
                    "type": "string",
                    "description": "The user's name, if they provided it"
                },
                "notes": {
                    "type": "string",
                    "description": "Any additional information about the conversation that's worth recording to give context"
                }
            },
            "required": ["email"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<serde_json::Value, ToolError> {
        let args: RecordUserDetailsArgs = parse_arguments(self.name(), arguments)?;

        let name = args.name.as_deref().unwrap_or(NAME_PLACEHOLDER);
        let notes = args.notes.as_deref().unwrap_or(NOTES_PLACEHOLDER);
        self.sink
            .fire(&format!("Recording {name} with email {} and notes {notes}", args.email))
            .await;

        Ok(recorded_ok())
    }
}
