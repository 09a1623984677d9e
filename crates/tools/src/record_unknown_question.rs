//! Record a question the persona could not answer.

use async_trait::async_trait;
use alterego_core::error::ToolError;
use alterego_core::tool::{Tool, ToolArguments};
use serde::Deserialize;
use crate::notification::NotificationSink;
use crate::{parse_arguments, recorded_ok};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordUnknownQuestionArgs {
    question: String,
}

pub struct RecordUnknownQuestionTool {
    sink: NotificationSink,
}

impl RecordUnknownQuestionTool {
    pub fn new(sink: NotificationSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for RecordUnknownQuestionTool {
    fn name(&self) -> &str {
        "record_unknown_question"
    }

    fn description(&self) -> &str {
        "Always use this tool to record any question that couldn't be answered as you didn't know the answer"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question that couldn't be answered"
                }
            },
            "required": ["question"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<serde_json::Value, ToolError> {
        let args: RecordUnknownQuestionArgs = parse_arguments(self.name(), arguments)?;
        self.sink.fire(&format!("Recording {}", args.question)).await;
        Ok(recorded_ok())
    }
}
