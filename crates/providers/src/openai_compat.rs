//! OpenAI-compatible chat completion client.
//!
//! Works with OpenAI and any endpoint exposing the same
//! `/chat/completions` shape (OpenRouter, Ollama, vLLM, ...).
//!
//! Supports:
//! - Chat completions with tool schemas (non-streaming)
//! - Streaming content over SSE

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use alterego_core::error::ProviderError;
use alterego_core::message::{Message, MessageToolCall, Role};
use alterego_core::provider::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible chat completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls: Option<Vec<ApiToolCall>> = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                // An assistant message that only carries tool calls has null content
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Build the JSON body shared by both request modes.
    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Map a non-success HTTP status to a provider error.
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    async fn post(&self, body: &serde_json::Value, streaming: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if streaming {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        self.check_status(response).await
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);
        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response.into_provider_response()
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            forward_sse(response.bytes_stream(), tx, &provider_name).await;
        });

        Ok(rx)
    }
}

// --- SSE forwarding ---

/// Forward the content fragments of an SSE byte stream to `tx`.
///
/// Ends with one `done` chunk: on the usage chunk, on `[DONE]`, or when the
/// body ends. A transport error ends with `StreamInterrupted` instead.
async fn forward_sse<S, B, E>(
    byte_stream: S,
    tx: mpsc::Sender<Result<StreamChunk, ProviderError>>,
    provider_name: &str,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(byte_stream.eventsource());

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };

        match parse_sse_data(&event.data) {
            SseEvent::Skip => {}
            SseEvent::Done => break,
            SseEvent::Malformed { data, error } => {
                trace!(
                    provider = %provider_name,
                    data = %data,
                    error = %error,
                    "Ignoring unparseable SSE chunk"
                );
            }
            SseEvent::Data(stream_resp) => {
                let content = stream_resp
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|c| !c.is_empty());

                if let Some(content) = content {
                    let chunk = StreamChunk { content: Some(content), done: false, usage: None };
                    if tx.send(Ok(chunk)).await.is_err() {
                        return; // receiver dropped
                    }
                }

                // Usage arrives in the final chunk when stream_options asks for it
                if let Some(usage) = stream_resp.usage {
                    let chunk = StreamChunk {
                        content: None,
                        done: true,
                        usage: Some(usage.into()),
                    };
                    let _ = tx.send(Ok(chunk)).await;
                    return;
                }
            }
        }
    }

    let _ = tx.send(Ok(StreamChunk { content: None, done: true, usage: None })).await;
}

enum SseEvent {
    Skip,
    Done,
    Data(StreamResponse),
    Malformed { data: String, error: String },
}

/// Interpret the `data` field of one SSE event.
fn parse_sse_data(data: &str) -> SseEvent {
    let data = data.trim();
    if data.is_empty() {
        return SseEvent::Skip;
    }

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => SseEvent::Data(resp),
        Err(e) => SseEvent::Malformed {
            data: data.to_string(),
            error: e.to_string(),
        },
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

impl ApiResponse {
    fn into_provider_response(self) -> Result<ProviderResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::parse)
            .unwrap_or(FinishReason::Stop);

        Ok(ProviderResponse {
            message: Message::assistant_tool_calls(choice.message.content.unwrap_or_default(), tool_calls),
            finish_reason,
            usage: self.usage.map(Usage::from),
            model: self.model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:11434/v1/", "x").unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are acting as Ada"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn tool_only_assistant_message_has_null_content() {
        let msg = Message::assistant_tool_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "record_unknown_question".into(),
                arguments: r#"{"question":"favourite colour?"}"#.into(),
            }],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert!(api_msgs[0].content.is_none());
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "record_unknown_question");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", r#"{"recorded":"ok"}"#);
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_includes_tools_and_cap() {
        let request = ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: Some(300),
            tools: vec![ToolDefinition {
                name: "record_user_details".into(),
                description: "Record an email".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            stream: false,
        };
        let body = OpenAiCompatProvider::request_body(&request, false);
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["tools"][0]["function"]["name"], "record_user_details");
        assert_eq!(body["stream"], false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn streaming_body_omits_absent_tools() {
        let request = ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
            stream: true,
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert!(body.get("tools").is_none());
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "record_user_details", "arguments": "{\"email\":\"a@b.com\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 18, "total_tokens": 138}
        }"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let response = api.into_provider_response().unwrap();

        assert!(response.wants_tool_calls());
        assert_eq!(response.message.content, "");
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].id, "call_abc");
        assert_eq!(response.usage.unwrap().total_tokens, 138);
    }

    #[test]
    fn parse_stop_response() {
        let data = r#"{"model":"m","choices":[{"finish_reason":"stop","message":{"role":"assistant","content":"Hi!"}}]}"#;
        let api: ApiResponse = serde_json::from_str(data).unwrap();
        let response = api.into_provider_response().unwrap();
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.message.content, "Hi!");
        assert!(response.usage.is_none());
    }

    #[test]
    fn empty_choices_is_api_error() {
        let api: ApiResponse = serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        let err = api.into_provider_response().unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 200, .. }));
    }

    // --- SSE tests ---

    fn sse(data: &str) -> Vec<u8> {
        format!("data: {data}\n\n").into_bytes()
    }

    fn delta(content: &str) -> String {
        serde_json::json!({ "choices": [{ "delta": { "content": content } }] }).to_string()
    }

    async fn forward(parts: Vec<Result<Vec<u8>, std::io::Error>>) -> Vec<Result<StreamChunk, ProviderError>> {
        let (tx, mut rx) = mpsc::channel(64);
        forward_sse(futures::stream::iter(parts), tx, "test").await;
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    fn contents(chunks: &[Result<StreamChunk, ProviderError>]) -> Vec<String> {
        chunks
            .iter()
            .filter_map(|c| c.as_ref().ok().and_then(|c| c.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn multibyte_character_split_across_reads() {
        let body = sse(&delta("Café — déjà vu"));
        let split = body.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let (head, tail) = body.split_at(split);

        let chunks = forward(vec![Ok(head.to_vec()), Ok(tail.to_vec())]).await;

        assert_eq!(contents(&chunks), vec!["Café — déjà vu"]);
        let last = chunks.last().unwrap().as_ref().unwrap();
        assert!(last.done);
    }

    #[tokio::test]
    async fn fragments_forwarded_in_order_until_usage() {
        let mut body = Vec::new();
        body.extend(b": keep-alive\n\n");
        body.extend(sse(&delta("Hello")));
        body.extend(sse(&delta("")));
        body.extend(sse(&delta(", I'm Ada.")));
        body.extend(sse(r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#));
        body.extend(sse(&delta("ignored")));
        body.extend(sse("[DONE]"));
        // Frame boundaries fall mid-event
        let parts = body.chunks(7).map(|c| Ok(c.to_vec())).collect();

        let chunks = forward(parts).await;

        assert_eq!(contents(&chunks), vec!["Hello", ", I'm Ada."]);
        assert_eq!(chunks.len(), 3);
        let last = chunks.last().unwrap().as_ref().unwrap();
        assert!(last.done);
        assert_eq!(last.usage.as_ref().map(|u| u.total_tokens), Some(15));
    }

    #[tokio::test]
    async fn done_marker_ends_stream() {
        let mut body = sse(&delta("Hi"));
        body.extend(sse("{oops"));
        body.extend(sse("[DONE]"));
        body.extend(sse(&delta("after done")));

        let chunks = forward(vec![Ok(body)]).await;

        assert_eq!(contents(&chunks), vec!["Hi"]);
        assert_eq!(chunks.len(), 2);
        let last = chunks[1].as_ref().unwrap();
        assert!(last.done && last.usage.is_none());
    }

    #[tokio::test]
    async fn body_ending_without_done_still_finishes() {
        let chunks = forward(vec![Ok(sse(&delta("partial")))]).await;

        assert_eq!(contents(&chunks), vec!["partial"]);
        assert!(chunks.last().unwrap().as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn transport_error_interrupts_stream() {
        let broken = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let chunks = forward(vec![Ok(sse(&delta("Hel"))), Err(broken)]).await;

        assert_eq!(chunks.len(), 2);
        assert!(matches!(
            chunks[1],
            Err(ProviderError::StreamInterrupted(ref m)) if m.contains("connection reset")
        ));
    }

    #[test]
    fn parse_data_variants() {
        assert!(matches!(parse_sse_data("[DONE]"), SseEvent::Done));
        assert!(matches!(parse_sse_data("  "), SseEvent::Skip));
        assert!(matches!(parse_sse_data("{oops"), SseEvent::Malformed { .. }));
        match parse_sse_data(r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#) {
            SseEvent::Data(resp) => assert_eq!(resp.choices[0].delta.content.as_deref(), Some("Hello")),
            _ => panic!("expected data event"),
        }
    }
}
