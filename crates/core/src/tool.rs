//! Tool trait — the abstraction over local side-effecting actions.
//!
//! The completion service may ask the caller to run a named tool before it
//! can answer. Tools are registered once at startup in a `ToolRegistry`;
//! dispatch is an explicit name lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::{Error, ToolError};
use crate::message::{Message, MessageToolCall};
use crate::provider::ToolDefinition;

/// Parsed tool arguments: a flat, string-keyed JSON object.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments parsed from the wire JSON
    pub arguments: ToolArguments,
}

impl ToolCall {
    /// Parse a wire tool call. Arguments that are not a JSON object are fatal.
    ///
    /// An empty argument string is treated as `{}`.
    pub fn parse(call: &MessageToolCall) -> Result<Self, Error> {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            ToolArguments::new()
        } else {
            serde_json::from_str::<ToolArguments>(raw).map_err(|e| Error::ToolArguments {
                tool_name: call.name.clone(),
                reason: e.to_string(),
            })?
        };

        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

/// The result of a tool execution, ready to be fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub tool_call_id: String,

    /// Serialized result payload (JSON text)
    pub content: String,
}

impl ToolResult {
    pub fn new(tool_call_id: impl Into<String>, value: &serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: value.to_string(),
        }
    }

    /// The `{}` result used when the model names a tool we do not have.
    pub fn empty(tool_call_id: impl Into<String>) -> Self {
        Self::new(tool_call_id, &serde_json::Value::Object(ToolArguments::new()))
    }

    pub fn into_message(self) -> Message {
        Message::tool_result(self.tool_call_id, self.content)
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "record_user_details").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments and return its JSON result.
    async fn execute(&self, arguments: ToolArguments) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Definitions are reported in registration order so the schema list sent to
/// the model is stable between calls.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool(&'static str);

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: ToolArguments) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::Value::Object(arguments))
        }
    }

    fn wire(arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool("echo")));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn definitions_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool("zeta")));
        registry.register(Box::new(EchoTool("alpha")));
        registry.register(Box::new(EchoTool("zeta")));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn parse_object_arguments() {
        let call = ToolCall::parse(&wire(r#"{"text":"hello"}"#)).unwrap();
        assert_eq!(call.arguments["text"], "hello");
        assert_eq!(call.id, "call_1");
    }

    #[test]
    fn parse_empty_arguments_as_empty_object() {
        let call = ToolCall::parse(&wire("  ")).unwrap();
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = ToolCall::parse(&wire("{not json")).unwrap_err();
        assert!(matches!(err, Error::ToolArguments { ref tool_name, .. } if tool_name == "echo"));
    }

    #[test]
    fn parse_rejects_non_object_json() {
        let err = ToolCall::parse(&wire(r#"["a","b"]"#)).unwrap_err();
        assert!(matches!(err, Error::ToolArguments { .. }));
    }

    #[test]
    fn empty_result_is_empty_object() {
        let result = ToolResult::empty("call_9");
        assert_eq!(result.content, "{}");
        let msg = result.into_message();
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool("echo")));
        let call = ToolCall::parse(&wire(r#"{"text":"hello world"}"#)).unwrap();
        let tool = registry.get(&call.name).unwrap();
        let value = tool.execute(call.arguments).await.unwrap();
        assert_eq!(value["text"], "hello world");
    }
}
